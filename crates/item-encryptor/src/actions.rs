//! Reconciles the configured action table with the one recorded in a header.
//!
//! # Rules
//!
//! - A name recorded in the header uses the header's action, whatever the
//!   current configuration says. The header reflects what was actually done.
//! - A name missing from the header was DO_NOTHING at encrypt time. If the
//!   current configuration now asks for more, the attribute is reported as
//!   weakly protected, or rejected when strict drift checking is on.
//! - A name missing from both is DO_NOTHING.
//!
//! On encrypt the configured non-DO_NOTHING entries are copied for every
//! attribute present in the item, so each header entry names an attribute that
//! existed when the item was written.

use std::collections::BTreeMap;

use common::{CryptoAction, Item};
use thiserror::Error;
use tracing::{debug, warn};

use crate::header::ParsedHeader;

/// Errors produced while resolving actions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    /// Strict mode: the configuration protects an attribute the header left unprotected.
    #[error("attribute {attribute} is configured as {configured:?} but was not protected at encrypt time")]
    Drift {
        attribute: String,
        configured: CryptoAction,
    },

    /// The header lists an attribute the presented item does not carry.
    #[error("header lists attribute {attribute} which is missing from the item")]
    UnknownAttribute { attribute: String },
}

/// Per-attribute treatment for one item on decrypt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedActions {
    /// Action for every attribute of the presented item.
    pub actions: BTreeMap<String, CryptoAction>,
    /// Attributes the configuration protects but the header does not.
    pub weakly_protected: Vec<String>,
}

impl ResolvedActions {
    pub fn action_for(&self, name: &str) -> CryptoAction {
        self.actions.get(name).copied().unwrap_or_default()
    }
}

/// Applies the reconciliation rules against one configured action table.
#[derive(Debug, Clone, Copy)]
pub struct ActionResolver<'a> {
    configured: &'a BTreeMap<String, CryptoAction>,
    strict_action_drift: bool,
    require_complete_header: bool,
}

impl<'a> ActionResolver<'a> {
    pub fn new(
        configured: &'a BTreeMap<String, CryptoAction>,
        strict_action_drift: bool,
        require_complete_header: bool,
    ) -> Self {
        Self {
            configured,
            strict_action_drift,
            require_complete_header,
        }
    }

    fn configured_action(&self, name: &str) -> CryptoAction {
        self.configured.get(name).copied().unwrap_or_default()
    }

    /// Actions to record in the header of a newly encrypted item.
    pub fn for_encrypt(&self, item: &Item) -> BTreeMap<String, CryptoAction> {
        self.configured
            .iter()
            .filter(|(name, action)| **action != CryptoAction::DoNothing && item.contains_key(*name))
            .map(|(name, action)| (name.clone(), *action))
            .collect()
    }

    /// Resolve the treatment of every attribute in `item` against `header`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnknownAttribute`] when completeness is required
    /// and a header entry has no attribute, and [`ActionError::Drift`] in strict
    /// mode when the configuration protects an attribute the header does not.
    pub fn for_decrypt(
        &self,
        header: &ParsedHeader,
        item: &Item,
    ) -> Result<ResolvedActions, ActionError> {
        if self.require_complete_header {
            if let Some(name) = header
                .attribute_actions_on_encrypt()
                .keys()
                .find(|name| !item.contains_key(*name))
            {
                return Err(ActionError::UnknownAttribute {
                    attribute: name.clone(),
                });
            }
        }

        let mut resolved = ResolvedActions::default();
        for name in item.keys() {
            let recorded = header.action_for(name);
            let configured = self.configured_action(name);

            if recorded == CryptoAction::DoNothing && configured > CryptoAction::DoNothing {
                if self.strict_action_drift {
                    return Err(ActionError::Drift {
                        attribute: name.clone(),
                        configured,
                    });
                }
                warn!(attribute = %name, configured = ?configured, "attribute was not protected at encrypt time");
                resolved.weakly_protected.push(name.clone());
            } else if recorded != configured {
                debug!(attribute = %name, recorded = ?recorded, configured = ?configured, "using recorded action");
            }

            resolved.actions.insert(name.clone(), recorded);
        }
        Ok(resolved)
    }
}
