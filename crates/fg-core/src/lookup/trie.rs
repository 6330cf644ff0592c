//! Rules indexed by their literal shortcut in a radix trie

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{collect_matching, LookupTable};
use crate::request::Request;
use crate::rule::{RuleHandle, RuleStorage};
use crate::types::StorageIndex;

/// Shortest shortcut worth indexing.
const MIN_SHORTCUT_LEN: usize = 3;

#[derive(Debug, Default)]
struct TrieNode {
    /// Children keyed by the first byte of their edge label
    children: HashMap<u8, TrieEdge>,
    /// Rules whose shortcut ends here
    values: Vec<StorageIndex>,
}

#[derive(Debug)]
struct TrieEdge {
    label: Box<[u8]>,
    node: TrieNode,
}

impl TrieNode {
    fn insert(&mut self, key: &[u8], value: StorageIndex) {
        let Some(&first) = key.first() else {
            self.values.push(value);
            return;
        };

        match self.children.entry(first) {
            Entry::Vacant(slot) => {
                slot.insert(TrieEdge {
                    label: key.into(),
                    node: TrieNode {
                        children: HashMap::new(),
                        values: vec![value],
                    },
                });
            }
            Entry::Occupied(slot) => {
                let edge = slot.into_mut();
                let common = common_prefix_len(&edge.label, key);

                if common < edge.label.len() {
                    // Split the edge at the divergence point
                    let suffix: Box<[u8]> = edge.label[common..].into();
                    let lower = std::mem::take(&mut edge.node);
                    let mut middle = TrieNode::default();
                    middle.children.insert(suffix[0], TrieEdge { label: suffix, node: lower });
                    edge.label = edge.label[..common].into();
                    edge.node = middle;
                }

                edge.node.insert(&key[common..], value);
            }
        }
    }

    /// Collect values of every key that is a prefix of `text`.
    fn collect_prefixes(&self, text: &[u8], out: &mut Vec<StorageIndex>) {
        let mut node = self;
        let mut rest = text;

        loop {
            out.extend_from_slice(&node.values);

            let Some(edge) = rest.first().and_then(|b| node.children.get(b)) else {
                return;
            };
            if !rest.starts_with(&edge.label) {
                return;
            }
            rest = &rest[edge.label.len()..];
            node = &edge.node;
        }
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Shortcuts that occur in nearly every URL and would make the trie return
/// most of its rules for every request.
fn is_near_universal(shortcut: &str) -> bool {
    let len = shortcut.len();
    (len < 6 && shortcut.starts_with("ws:"))
        || (len < 7 && shortcut.starts_with("|ws"))
        || (len < 9 && shortcut.starts_with("http"))
        || (len < 10 && shortcut.starts_with("|http"))
}

/// Rules with a usable shortcut, found by walking the trie from every
/// offset of the lowercase URL.
#[derive(Debug, Default)]
pub struct TrieLookupTable {
    root: TrieNode,
    indices: HashSet<StorageIndex>,
}

impl TrieLookupTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: RuleHandle> LookupTable<R> for TrieLookupTable {
    fn add_rule(&mut self, rule: &Arc<R>, index: StorageIndex) -> bool {
        let shortcut = rule.shortcut();
        if shortcut.len() < MIN_SHORTCUT_LEN || is_near_universal(shortcut) {
            return false;
        }

        if self.indices.insert(index) {
            self.root.insert(shortcut.to_ascii_lowercase().as_bytes(), index);
        }
        true
    }

    fn match_all<S: RuleStorage<Rule = R>>(&self, request: &Request, storage: &S) -> Vec<Arc<R>> {
        if self.indices.is_empty() {
            return Vec::new();
        }

        let url = request.url_lowercase().as_bytes();
        let mut candidates = Vec::new();
        for offset in 0..url.len() {
            self.root.collect_prefixes(&url[offset..], &mut candidates);
        }

        collect_matching(candidates, request, storage)
    }

    fn rules_count(&self) -> usize {
        self.indices.len()
    }
}
