//! Per-tick driver: preprocess first, then every sub-rule-set against its
//! own staging handler, then write-back in registration order.

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::resource::ResourceHandler;
use crate::store::DataStore;
use crate::value::ValueMap;
use cascade_ast::Expr;
use cascade_compiler::ruleset::{read_source, RuleSetMetaInfo, TranslatorError};
use cascade_compiler::ContextStack;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Translate(#[from] TranslatorError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl EngineError {
    /// User-facing rendering with the error's diagnostic code
    pub fn report(&self) -> String {
        match self {
            EngineError::Translate(err) => err.report(),
            EngineError::Runtime(err) => err.to_diagnostic().to_string(),
        }
    }
}

/// One sub-rule-set: its function body and its private staging handler
pub struct SubRuleSet {
    pub handler: ResourceHandler,
    pub body: Expr,
    pub last_hit: i64,
}

impl SubRuleSet {
    fn new(body: Expr) -> Self {
        Self {
            handler: ResourceHandler::new(),
            body,
            last_hit: -1,
        }
    }
}

/// The interpreter back end: owns the canonical data store, the frozen
/// compile context and one `SubRuleSet` per registered sub-rule-set.
pub struct RuleSetEngine {
    context: ContextStack,
    data: DataStore,
    init_body: Expr,
    preprocess: SubRuleSet,
    sub_rule_sets: Vec<SubRuleSet>,
    hit_rules: Vec<i64>,
}

impl RuleSetEngine {
    /// Build the engine from a rule-set document source
    pub fn build_from_source(source: &str) -> Result<Self, EngineError> {
        let mut context = ContextStack::new();
        let mut meta = RuleSetMetaInfo::default();
        let info = read_source(source, &mut context, &mut meta)?;

        let init_body = take_body(&mut context, &info.init)?;
        let preprocess_body = take_body(&mut context, &info.preprocess)?;
        let mut sub_rule_sets = Vec::new();
        for name in &info.sub_rule_sets {
            sub_rule_sets.push(SubRuleSet::new(take_body(&mut context, name)?));
        }
        // the pre-defines body is all definitions; nothing left to run
        context.global.real_funcs.remove(&info.pre_defines);

        Ok(Self {
            context,
            data: DataStore::new(meta),
            init_body,
            preprocess: SubRuleSet::new(preprocess_body),
            sub_rule_sets,
            hit_rules: Vec::new(),
        })
    }

    /// Fill the canonical maps with empty instances, then run the
    /// InitValue assignment block once and commit it
    pub fn init(&mut self) -> Result<(), RuntimeError> {
        self.data.init()?;
        let Self {
            context,
            data,
            init_body,
            preprocess,
            ..
        } = self;
        let mut interpreter = Interpreter::new(context, data, &mut preprocess.handler);
        interpreter.run(init_body)?;
        self.preprocess.handler.write_back(&mut self.data)?;
        Ok(())
    }

    pub fn set_input(&mut self, values: &ValueMap) {
        self.data.set_input(values);
    }

    /// One evaluation cycle. Preprocess commits before any sub-rule-set
    /// runs; every sub-rule-set then observes the same pre-tick cache, and
    /// staged writes merge back only after all of them have finished.
    pub fn tick(&mut self) -> Result<(), RuntimeError> {
        {
            let Self {
                context,
                data,
                preprocess,
                ..
            } = self;
            let mut interpreter = Interpreter::new(context, data, &mut preprocess.handler);
            interpreter.run(&preprocess.body)?;
        }
        self.preprocess.handler.write_back(&mut self.data)?;

        self.hit_rules.clear();
        {
            let Self {
                context,
                data,
                sub_rule_sets,
                hit_rules,
                ..
            } = self;
            for sub in sub_rule_sets.iter_mut() {
                let mut interpreter = Interpreter::new(context, data, &mut sub.handler);
                let value = interpreter.run(&sub.body)?;
                let hit = interpreter.numeric(value)? as i64;
                sub.last_hit = hit;
                hit_rules.push(hit);
            }
        }
        for sub in self.sub_rule_sets.iter_mut() {
            sub.handler.write_back(&mut self.data)?;
        }
        log::debug!("tick complete, hit rules: {:?}", self.hit_rules);
        Ok(())
    }

    /// 0-based index of the winning atom per sub-rule-set for the last
    /// tick; -1 where no atom matched
    pub fn hit_rules(&self) -> &[i64] {
        &self.hit_rules
    }

    pub fn output(&self) -> &ValueMap {
        &self.data.output
    }

    pub fn input(&self) -> &ValueMap {
        &self.data.input
    }

    pub fn cache(&self) -> &ValueMap {
        &self.data.cache
    }

    pub fn meta(&self) -> &RuleSetMetaInfo {
        &self.data.meta
    }

    pub fn context(&self) -> &ContextStack {
        &self.context
    }
}

fn take_body(context: &mut ContextStack, name: &str) -> Result<Expr, EngineError> {
    context
        .global
        .real_funcs
        .remove(name)
        .map(|def| *def.body)
        .ok_or_else(|| {
            EngineError::Runtime(RuntimeError::UnknownFunction(name.to_string()))
        })
}
