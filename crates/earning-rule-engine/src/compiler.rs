//! 规则编译器
//!
//! 将 rule_json 字符串解析并编译成内存中可求值的工作流，或将其拒绝。
//! `validate_rule_json` 可独立调用，用于在管理端写入前做校验。

use crate::ast::Expr;
use crate::error::{Result, RuleError};
use crate::models::{RuleDef, WorkflowDef};
use crate::parser::parse_expression;

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub error_message: Option<String>,
    /// 布尔断言
    pub predicate: Expr,
    /// 成功动作表达式，缺省时规则命中不产生积分
    pub action: Option<Expr>,
}

/// 编译后的工作流
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    pub name: String,
    /// 规则按定义顺序保存，执行时首个命中者生效
    pub rules: Vec<CompiledRule>,
}

/// 校验 rule_json 的结构有效性
///
/// 有效的定义是：能反序列化为工作流，且工作流名称非空、规则列表非空。
/// 表达式本身的语法错误不在此处检查，编译阶段才会暴露。
pub fn validate_rule_json(json: &str) -> bool {
    match serde_json::from_str::<WorkflowDef>(json) {
        Ok(def) => !def.workflow_name.is_empty() && !def.rules.is_empty(),
        Err(_) => false,
    }
}

/// 从 JSON 字符串编译工作流
pub fn compile_str(json: &str) -> Result<CompiledWorkflow> {
    let def: WorkflowDef = serde_json::from_str(json)?;
    compile(def)
}

/// 编译工作流定义
pub fn compile(def: WorkflowDef) -> Result<CompiledWorkflow> {
    if def.workflow_name.is_empty() {
        return Err(RuleError::Compile("工作流名称不能为空".to_string()));
    }

    if def.rules.is_empty() {
        return Err(RuleError::Compile(format!(
            "工作流 '{}' 的规则列表不能为空",
            def.workflow_name
        )));
    }

    let mut rules = Vec::with_capacity(def.rules.len());
    for rule in def.rules {
        rules.push(compile_rule(&def.workflow_name, rule)?);
    }

    Ok(CompiledWorkflow {
        name: def.workflow_name,
        rules,
    })
}

fn compile_rule(workflow_name: &str, def: RuleDef) -> Result<CompiledRule> {
    if def.rule_name.is_empty() {
        return Err(RuleError::Compile(format!(
            "工作流 '{}' 中存在未命名规则",
            workflow_name
        )));
    }

    let predicate = parse_expression(&def.expression).map_err(|e| {
        RuleError::Compile(format!(
            "规则 '{}' 的条件表达式无效: {}",
            def.rule_name, e
        ))
    })?;

    let action = def
        .actions
        .and_then(|a| a.on_success)
        .and_then(|s| s.context)
        .map(|ctx| {
            parse_expression(&ctx.expression).map_err(|e| {
                RuleError::Compile(format!(
                    "规则 '{}' 的动作表达式无效: {}",
                    def.rule_name, e
                ))
            })
        })
        .transpose()?;

    Ok(CompiledRule {
        name: def.rule_name,
        error_message: def.error_message,
        predicate,
        action,
    })
}
