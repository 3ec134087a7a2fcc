use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tungsten_core::{system, Expr};

use crate::attrs::Attributes;
use crate::rule::{Rule, RuleSet};

/// Which position of an expression triggers a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// The symbol alone.
    Own,
    /// The symbol as head.
    Down,
    /// The symbol as head of the head.
    Sub,
    /// The symbol inside an argument.
    Up,
    /// `Default[f]`-style fallback values.
    Default,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SymbolRecord {
    attributes: Attributes,
    own: RuleSet,
    down: RuleSet,
    sub: RuleSet,
    up: RuleSet,
    defaults: RuleSet,
    messages: HashMap<String, String>,
}

impl SymbolRecord {
    fn slot(&self, slot: Slot) -> &RuleSet {
        match slot {
            Slot::Own => &self.own,
            Slot::Down => &self.down,
            Slot::Sub => &self.sub,
            Slot::Up => &self.up,
            Slot::Default => &self.defaults,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut RuleSet {
        match slot {
            Slot::Own => &mut self.own,
            Slot::Down => &mut self.down,
            Slot::Sub => &mut self.sub,
            Slot::Up => &mut self.up,
            Slot::Default => &mut self.defaults,
        }
    }
}

/// Session-wide symbol definitions: attributes, the five rule slots and the
/// message template table, keyed by qualified symbol name.
///
/// There is no snapshot isolation: mutations are visible immediately to any
/// in-flight evaluation reading the same symbol, including an evaluation
/// that redefines the rule it is currently applying.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DefinitionStore {
    symbols: HashMap<String, SymbolRecord>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attributes(&self, symbol: &str) -> Attributes {
        self.symbols
            .get(symbol)
            .map(|r| r.attributes)
            .unwrap_or_default()
    }

    pub fn set_attributes(&mut self, symbol: &str, attrs: Attributes) {
        self.record_mut(symbol).attributes = attrs;
    }

    pub fn add_attributes(&mut self, symbol: &str, attrs: Attributes) {
        self.record_mut(symbol).attributes |= attrs;
    }

    pub fn clear_attributes(&mut self, symbol: &str) {
        if let Some(r) = self.symbols.get_mut(symbol) {
            r.attributes = Attributes::empty();
        }
    }

    pub fn rules(&self, slot: Slot, symbol: &str) -> Option<&RuleSet> {
        self.symbols
            .get(symbol)
            .map(|r| r.slot(slot))
            .filter(|rs| !rs.is_empty())
    }

    /// Inserts respecting the specificity ranking of the target slot.
    pub fn add_rule(&mut self, slot: Slot, symbol: &str, rule: Rule) {
        log::debug!(
            "add_rule {:?} for {}: {}",
            slot,
            symbol,
            rule.pattern
        );
        self.record_mut(symbol).slot_mut(slot).insert(rule);
    }

    pub fn remove_rule(&mut self, slot: Slot, symbol: &str, pattern: &Expr) -> usize {
        match self.symbols.get_mut(symbol) {
            Some(r) => r.slot_mut(slot).remove_pattern(pattern),
            None => 0,
        }
    }

    pub fn clear_rules(&mut self, slot: Slot, symbol: &str) {
        if let Some(r) = self.symbols.get_mut(symbol) {
            r.slot_mut(slot).clear();
        }
    }

    /// The registered `Default[symbol]` value, if any. Consulted by the
    /// matcher for `Optional` patterns without an explicit default.
    pub fn default_value(&self, symbol: &str) -> Option<&Expr> {
        let probe = Expr::call(system::DEFAULT, vec![Expr::symbol(symbol)]);
        self.symbols
            .get(symbol)?
            .defaults
            .iter()
            .find(|r| r.pattern == probe)
            .map(|r| &r.rhs)
    }

    pub fn set_default_value(&mut self, symbol: &str, value: Expr) {
        let pattern = Expr::call(system::DEFAULT, vec![Expr::symbol(symbol)]);
        let rec = self.record_mut(symbol);
        rec.defaults.remove_pattern(&pattern);
        rec.defaults.insert(Rule::immediate(pattern, value));
    }

    pub fn set_message(&mut self, symbol: &str, tag: &str, template: &str) {
        self.record_mut(symbol)
            .messages
            .insert(tag.to_string(), template.to_string());
    }

    pub fn message_template(&self, symbol: &str, tag: &str) -> Option<&str> {
        self.symbols
            .get(symbol)
            .and_then(|r| r.messages.get(tag))
            .map(|s| s.as_str())
    }

    fn record_mut(&mut self, symbol: &str) -> &mut SymbolRecord {
        self.symbols.entry(symbol.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_default_to_empty() {
        let mut store = DefinitionStore::new();
        assert_eq!(store.attributes("f"), Attributes::empty());
        store.add_attributes("f", Attributes::ORDERLESS);
        store.add_attributes("f", Attributes::FLAT);
        assert_eq!(store.attributes("f"), Attributes::ORDERLESS | Attributes::FLAT);
        store.clear_attributes("f");
        assert_eq!(store.attributes("f"), Attributes::empty());
    }

    #[test]
    fn rule_slots_are_independent(){
        let mut store = DefinitionStore::new();
        let rule = Rule::delayed(Expr::symbol("f"), Expr::integer(1));
        store.add_rule(Slot::Own, "f", rule);
        assert!(store.rules(Slot::Own, "f").is_some());
        assert!(store.rules(Slot::Down, "f").is_none());
    }

    #[test]
    fn default_value_round_trip() {
        let mut store = DefinitionStore::new();
        assert!(store.default_value("f").is_none());
        store.set_default_value("f", Expr::integer(0));
        assert_eq!(store.default_value("f"), Some(&Expr::integer(0)));
        store.set_default_value("f", Expr::integer(1));
        assert_eq!(store.default_value("f"), Some(&Expr::integer(1)));
    }

    #[test]
    fn message_templates() {
        let mut store = DefinitionStore::new();
        store.set_message("Thread", "tdlen", "Objects of unequal length cannot be combined.");
        assert!(store.message_template("Thread", "tdlen").is_some());
        assert!(store.message_template("Thread", "nope").is_none());
    }
}
