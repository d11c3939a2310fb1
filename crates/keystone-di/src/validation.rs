//! Dependency graph validation
//!
//! Three passes over a container's registrations, all errors aggregated:
//!
//! 1. every declared dependency resolves locally or through an ancestor
//! 2. every alias target resolves locally or through an ancestor
//! 3. white/grey/black depth-first search over the induced graph, where an
//!    alias is an edge to its target and ancestor-owned tokens are leaves
//!
//! Each distinct cycle is reported once. Two back edges describing the same
//! cycle from different starting points are recognised by rotating the
//! cycle so its smallest token id comes first.

use std::collections::{HashMap, HashSet};

use crate::error::ContainerError;
use crate::registration::ServiceRegistration;
use crate::registry::ServiceRegistry;
use crate::token::TokenKey;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Validates one container's registrations
pub(crate) struct DependencyGraphValidator<'a> {
    registry: &'a ServiceRegistry,
    ancestor_has: &'a dyn Fn(&TokenKey) -> bool,
}

impl<'a> DependencyGraphValidator<'a> {
    pub(crate) fn new(
        registry: &'a ServiceRegistry,
        ancestor_has: &'a dyn Fn(&TokenKey) -> bool,
    ) -> Self {
        Self {
            registry,
            ancestor_has,
        }
    }

    fn is_resolvable(&self, key: &TokenKey) -> bool {
        self.registry.contains(key) || (self.ancestor_has)(key)
    }

    /// Run all passes. Output order is deterministic: missing dependencies
    /// and dangling aliases in registration order, then cycles in discovery
    /// order.
    pub(crate) fn validate(&self) -> Vec<ContainerError> {
        let mut errors = self.check_references();
        errors.extend(self.detect_cycles());
        errors
    }

    fn check_references(&self) -> Vec<ContainerError> {
        let mut errors = Vec::new();

        for (key, registration) in self.registry.iter() {
            match registration {
                ServiceRegistration::Alias { target } => {
                    if !self.is_resolvable(target) {
                        errors.push(ContainerError::AliasTargetMissing {
                            alias: key.clone(),
                            target: target.clone(),
                        });
                    }
                }
                ServiceRegistration::Class(c) | ServiceRegistration::Factory(c) => {
                    let mut reported = HashSet::new();
                    for dependency in &c.dependencies {
                        if !self.is_resolvable(dependency) && reported.insert(dependency.id()) {
                            errors.push(ContainerError::DependencyNotRegistered {
                                dependency: dependency.clone(),
                                required_by: key.clone(),
                            });
                        }
                    }
                }
                ServiceRegistration::Value { .. } => {}
            }
        }

        errors
    }

    fn detect_cycles(&self) -> Vec<ContainerError> {
        let mut colors: HashMap<&TokenKey, Color> = self
            .registry
            .iter()
            .map(|(key, _)| (key, Color::White))
            .collect();
        let mut seen_cycles: HashSet<Vec<u64>> = HashSet::new();
        let mut errors = Vec::new();

        for (root, _) in self.registry.iter() {
            if colors.get(root) != Some(&Color::White) {
                continue;
            }

            // Explicit stack of (node, next edge index) keeps deep graphs off
            // the call stack.
            let mut path: Vec<&TokenKey> = vec![root];
            let mut cursor: Vec<usize> = vec![0];
            colors.insert(root, Color::Grey);

            while let Some(node) = path.last().copied() {
                let depth = path.len() - 1;
                let edges = self.registry.get(node).map(|r| r.edges()).unwrap_or(&[]);
                let index = cursor[depth];

                if index >= edges.len() {
                    colors.insert(node, Color::Black);
                    path.pop();
                    cursor.pop();
                    continue;
                }
                cursor[depth] += 1;

                let next = &edges[index];
                match colors.get(next).copied() {
                    // Not registered here: ancestor leaf or already reported missing
                    None => {}
                    Some(Color::Black) => {}
                    Some(Color::White) => {
                        colors.insert(next, Color::Grey);
                        path.push(next);
                        cursor.push(0);
                    }
                    Some(Color::Grey) => {
                        let start = path.iter().position(|k| *k == next).unwrap_or(0);
                        let cycle: Vec<TokenKey> =
                            path[start..].iter().map(|k| (*k).clone()).collect();

                        if seen_cycles.insert(normalize(&cycle)) {
                            let mut reported = cycle;
                            reported.push(next.clone());
                            errors.push(ContainerError::CircularDependencyDetected {
                                path: reported,
                            });
                        }
                    }
                }
            }
        }

        errors
    }
}

/// Rotate a cycle so its smallest id comes first
fn normalize(cycle: &[TokenKey]) -> Vec<u64> {
    let ids: Vec<u64> = cycle.iter().map(TokenKey::id).collect();
    let pivot = ids
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    ids[pivot..].iter().chain(ids[..pivot].iter()).copied().collect()
}
