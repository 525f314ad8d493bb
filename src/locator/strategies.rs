//! Container discovery strategies.
//!
//! Each strategy is one empirical way of reaching the host store from the
//! root element. They are tried in order by the locator; none of them is
//! authoritative on its own.

use std::sync::{Arc, LazyLock};

use {regex::Regex, thiserror::Error, tracing::trace};

use crate::host::{HostEnvironment, HostRef, StateContainer};

/// Parent links followed before the fiber walk gives up.
const MAX_FIBER_DEPTH: usize = 64;

/// Property holding the store on the tooling module.
const TOOLING_STORE_KEY: &str = "reduxStore";

/// Internal property names under which the framework attaches a fiber to a DOM node.
static FIBER_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^__react(Fiber|InternalInstance|Container)\$[A-Za-z0-9]+$")
        .expect("fiber key pattern is valid")
});

/// Reason a single strategy did not produce a store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyMiss {
    /// A property along the pinned chain was missing.
    #[error("property chain broken at '{step}'")]
    PathBroken { step: String },
    /// The final node exists but is not a state container.
    #[error("node at end of chain is not a store")]
    NotAContainer,
    /// No property matched the internal naming pattern.
    #[error("no internal fiber key on root element")]
    NoFiberKey,
    /// Walked all parent links without finding a store.
    #[error("no store within {depth} parent links")]
    DepthExhausted { depth: usize },
    /// The module registry holds no tooling module.
    #[error("tooling module not present in this build")]
    NoToolingModule,
}

/// One way of reaching the host's state container.
pub trait DiscoveryStrategy: Send + Sync {
    /// Short name used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Tries to reach the container from the root element.
    ///
    /// # Errors
    ///
    /// Returns a `StrategyMiss` describing where the attempt stopped.
    fn locate(
        &self,
        root: &HostRef,
        env: &dyn HostEnvironment,
    ) -> Result<Arc<dyn StateContainer>, StrategyMiss>;
}

/// Walks a fixed, version-pinned chain of framework properties.
pub struct FixedPathStrategy {
    path: &'static [&'static str],
}

impl FixedPathStrategy {
    #[must_use]
    pub const fn new(path: &'static [&'static str]) -> Self {
        Self { path }
    }
}

impl DiscoveryStrategy for FixedPathStrategy {
    fn name(&self) -> &'static str {
        "fixed-path"
    }

    fn locate(
        &self,
        root: &HostRef,
        _env: &dyn HostEnvironment,
    ) -> Result<Arc<dyn StateContainer>, StrategyMiss> {
        let mut node = Arc::clone(root);
        for step in self.path {
            node = node.get(step).ok_or_else(|| StrategyMiss::PathBroken {
                step: (*step).to_string(),
            })?;
        }
        node.as_container().ok_or(StrategyMiss::NotAContainer)
    }
}

/// Follows the retained component-tree links upward from the root element.
#[derive(Default)]
pub struct FiberWalkStrategy;

impl FiberWalkStrategy {
    fn store_on(node: &HostRef) -> Option<Arc<dyn StateContainer>> {
        let from_props = || node.get("memoizedProps")?.get("store")?.as_container();
        let from_instance = || {
            node.get("stateNode")?
                .get("props")?
                .get("store")?
                .as_container()
        };
        let from_context = || {
            node.get("memoizedProps")?
                .get("value")?
                .get("store")?
                .as_container()
        };
        from_props().or_else(from_instance).or_else(from_context)
    }
}

impl DiscoveryStrategy for FiberWalkStrategy {
    fn name(&self) -> &'static str {
        "fiber-walk"
    }

    fn locate(
        &self,
        root: &HostRef,
        _env: &dyn HostEnvironment,
    ) -> Result<Arc<dyn StateContainer>, StrategyMiss> {
        let key = root
            .keys()
            .into_iter()
            .find(|key| FIBER_KEY_PATTERN.is_match(key))
            .ok_or(StrategyMiss::NoFiberKey)?;
        trace!(key = %key, "Found internal fiber key");

        let mut current = root.get(&key);
        let mut depth = 0;
        while let Some(node) = current {
            if let Some(store) = Self::store_on(&node) {
                trace!(depth, "Store exposed by fiber node");
                return Ok(store);
            }
            depth += 1;
            if depth >= MAX_FIBER_DEPTH {
                break;
            }
            current = node.get("return");
        }
        Err(StrategyMiss::DepthExhausted { depth })
    }
}

/// Asks the bundled tooling module for its direct store reference.
#[derive(Default)]
pub struct ToolingModuleStrategy;

impl DiscoveryStrategy for ToolingModuleStrategy {
    fn name(&self) -> &'static str {
        "tooling-module"
    }

    fn locate(
        &self,
        _root: &HostRef,
        env: &dyn HostEnvironment,
    ) -> Result<Arc<dyn StateContainer>, StrategyMiss> {
        env.module_registry()
            .iter()
            .filter_map(|module| module.get(TOOLING_STORE_KEY))
            .find_map(|candidate| candidate.as_container())
            .ok_or(StrategyMiss::NoToolingModule)
    }
}
