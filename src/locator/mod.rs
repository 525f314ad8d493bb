//! Discovery of the host's centralized state container.
//!
//! The host exposes no API for its store. The locator polls for the root
//! element and runs an ordered chain of [`DiscoveryStrategy`] values against
//! it until one succeeds or the timeout expires. Nothing is cached: the
//! internal path differs between host sessions, so every adapter instance
//! runs discovery from scratch.

use std::{sync::Arc, time::Duration};

use {
    tokio::time::{Instant, sleep},
    tracing::{debug, info, warn},
};

use crate::{
    config::AdapterSettings,
    error::LocatorError,
    host::{HostEnvironment, HostVersion, StateContainer},
};

mod strategies;

pub use strategies::{
    DiscoveryStrategy, FiberWalkStrategy, FixedPathStrategy, StrategyMiss, ToolingModuleStrategy,
};

const V3_STORE_PATH: &[&str] = &[
    "_reactRootContainer",
    "_internalRoot",
    "current",
    "child",
    "memoizedProps",
    "store",
];

const V2_STORE_PATH: &[&str] = &[
    "_reactRootContainer",
    "_internalRoot",
    "current",
    "child",
    "child",
    "memoizedProps",
    "store",
];

/// Version-pinned property chain from the root element to the store.
#[must_use]
pub fn fixed_store_path(version: HostVersion) -> &'static [&'static str] {
    match version {
        HostVersion::V2 => V2_STORE_PATH,
        HostVersion::V3 => V3_STORE_PATH,
    }
}

/// Outcome of a single discovery pass.
enum Attempt {
    NoRoot,
    Missed(Vec<String>),
    Found(Arc<dyn StateContainer>),
}

/// Polls the host until a discovery strategy yields the state container.
pub struct StoreLocator {
    selector: String,
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
    timeout: Duration,
    interval: Duration,
}

impl StoreLocator {
    /// Builds the strategy chain for a host version.
    ///
    /// The tooling module is preferred on V3 when the build ships it; the
    /// property chain and the fiber walk follow as fallbacks.
    #[must_use]
    pub fn for_version(version: HostVersion, settings: &AdapterSettings) -> Self {
        let mut strategies: Vec<Box<dyn DiscoveryStrategy>> = Vec::new();
        if version == HostVersion::V3 {
            strategies.push(Box::new(ToolingModuleStrategy));
        }
        strategies.push(Box::new(FixedPathStrategy::new(fixed_store_path(version))));
        strategies.push(Box::new(FiberWalkStrategy));

        Self::with_strategies(
            settings.root_selector.clone(),
            strategies,
            settings.locate_timeout(),
            settings.locate_poll_interval(),
        )
    }

    /// Builds a locator with an explicit strategy chain.
    #[must_use]
    pub fn with_strategies(
        selector: String,
        strategies: Vec<Box<dyn DiscoveryStrategy>>,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            selector,
            strategies,
            timeout,
            interval,
        }
    }

    /// Names of the strategies, in the order they are tried.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Waits for the store.
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::DomElementNotFound` if the root element never
    /// appeared, or `LocatorError::StoreNotFound` if it did but every
    /// strategy kept missing until the timeout.
    pub async fn locate(
        &self,
        env: &dyn HostEnvironment,
    ) -> Result<Arc<dyn StateContainer>, LocatorError> {
        let deadline = Instant::now() + self.timeout;
        let mut root_seen = false;
        let mut last_misses = Vec::new();
        let mut attempts = 0_u32;

        loop {
            attempts += 1;
            match self.attempt(env) {
                Attempt::Found(store) => {
                    info!(attempts, "State container located");
                    return Ok(store);
                }
                Attempt::NoRoot => {}
                Attempt::Missed(misses) => {
                    root_seen = true;
                    last_misses = misses;
                }
            }

            if Instant::now() >= deadline {
                break;
            }
            sleep(self.interval).await;
        }

        if root_seen {
            let attempted: Vec<String> = self
                .strategy_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            warn!(attempts, ?last_misses, "No discovery strategy found the store");
            Err(LocatorError::StoreNotFound { attempted })
        } else {
            warn!(attempts, selector = %self.selector, "Root element never appeared");
            Err(LocatorError::DomElementNotFound {
                selector: self.selector.clone(),
            })
        }
    }

    fn attempt(&self, env: &dyn HostEnvironment) -> Attempt {
        let Some(root) = env.query_selector(&self.selector) else {
            return Attempt::NoRoot;
        };

        let mut misses = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match strategy.locate(&root, env) {
                Ok(store) => {
                    debug!(strategy = strategy.name(), "Discovery strategy succeeded");
                    return Attempt::Found(store);
                }
                Err(miss) => {
                    debug!(strategy = strategy.name(), %miss, "Discovery strategy missed");
                    misses.push(format!("{}: {miss}", strategy.name()));
                }
            }
        }
        Attempt::Missed(misses)
    }
}
