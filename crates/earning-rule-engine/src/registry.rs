//! 工作流注册表
//!
//! 持有当前启用的已编译工作流集合，并向评估请求提供只读快照。
//! 活跃集是不可变快照，重载时整体替换（arc-swap 原子指针交换），
//! 读取方看到的要么是旧集合要么是新集合，绝不会是半成品。

use crate::compiler::{self, CompiledWorkflow};
use crate::error::Result;
use crate::store::EarningRuleStore;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{info, warn};

/// 不可变的工作流活跃集
///
/// 以工作流名称为键去重：同名工作流后编译者生效，并保留首次出现的位置
/// （add-or-replace 语义）。迭代顺序即重载时的插入顺序。
#[derive(Debug, Default)]
pub struct WorkflowSet {
    workflows: Vec<Arc<CompiledWorkflow>>,
}

impl WorkflowSet {
    fn add_or_replace(&mut self, workflow: CompiledWorkflow) {
        let workflow = Arc::new(workflow);
        match self.workflows.iter().position(|w| w.name == workflow.name) {
            Some(index) => self.workflows[index] = workflow,
            None => self.workflows.push(workflow),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledWorkflow>> {
        self.workflows.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<CompiledWorkflow>> {
        self.workflows.iter().find(|w| w.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.workflows.iter().map(|w| w.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

/// 工作流注册表
pub struct WorkflowRegistry {
    store: Arc<dyn EarningRuleStore>,
    active: ArcSwap<WorkflowSet>,
}

impl WorkflowRegistry {
    /// 创建空注册表
    ///
    /// 初始集合为空，进程启动时应调用一次 reload()。零条启用规则是
    /// 合法状态，所有评估结果为 0 分。
    pub fn new(store: Arc<dyn EarningRuleStore>) -> Self {
        Self {
            store,
            active: ArcSwap::from_pointee(WorkflowSet::default()),
        }
    }

    /// 重建活跃集
    ///
    /// 从存储拉取全部启用规则并逐条编译；编译失败的规则记录日志后跳过，
    /// 不影响其余规则加载。全部编译完成后原子替换整个集合。
    /// 存储读取失败时返回错误并保留上一次的活跃集（last known good）。
    pub async fn reload(&self) -> Result<usize> {
        let rules = self.store.list_active().await?;
        let fetched = rules.len();

        let mut set = WorkflowSet::default();
        let mut skipped = 0usize;
        for rule in rules {
            match compiler::compile_str(&rule.rule_json) {
                Ok(workflow) => set.add_or_replace(workflow),
                Err(e) => {
                    warn!(
                        rule_id = rule.id,
                        rule_name = %rule.name,
                        error = %e,
                        "规则编译失败，已跳过"
                    );
                    skipped += 1;
                }
            }
        }

        let loaded = set.len();
        self.active.store(Arc::new(set));

        info!(fetched, loaded, skipped, "工作流活跃集已重载");
        Ok(loaded)
    }

    /// 获取活跃集快照
    ///
    /// 快照是廉价的 Arc 克隆，单次评估在同一快照上完成。
    pub fn snapshot(&self) -> Arc<WorkflowSet> {
        self.active.load_full()
    }

    /// 当前活跃工作流名称，按重载时的插入顺序返回
    pub fn workflow_names(&self) -> Vec<String> {
        self.active.load().names()
    }

    pub fn len(&self) -> usize {
        self.active.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.load().is_empty()
    }
}
