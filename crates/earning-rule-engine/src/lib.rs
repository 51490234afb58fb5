//! 积分获取规则引擎
//!
//! 提供可动态重配置的规则评估能力，支持：
//! - JSON 工作流定义的解析、校验和编译
//! - 小型解释型表达式语言（比较/算术/逻辑操作符 + 事实字段引用）
//! - 活跃集原子重载（不可变快照 + 指针交换）
//! - 交易积分评估（工作流内首个命中规则生效，跨工作流求和）

pub mod ast;
pub mod compiler;
pub mod error;
pub mod eval;
pub mod evaluator;
pub mod lexer;
pub mod models;
pub mod parser;
pub mod registry;
pub mod store;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use compiler::{CompiledRule, CompiledWorkflow, compile, compile_str, validate_rule_json};
pub use error::{Result, RuleError};
pub use eval::{FactValue, evaluate};
pub use evaluator::{PgTransactionHistory, TransactionEvaluator, TransactionHistory};
pub use models::{FactContext, Transaction, WorkflowDef};
pub use parser::parse_expression;
pub use registry::{WorkflowRegistry, WorkflowSet};
pub use store::{ActiveRule, EarningRuleStore, PgEarningRuleStore};
