/*
 * conditional.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Conditional blocks: `if`, `elseif`, `else`, `endif`.
//!
//! Each open `if` is one tri-state [`Branch`] on a stack. Lines are emitted
//! only while every frame on the stack is [`Branch::Matched`].
//!
//! Conditions are `&`/`|` chains of `name<op>value` terms evaluated strictly
//! left to right with short-circuiting and no operator precedence:
//! `a=1|b=2&c=3` stops at the first true term before an `|`, and at the first
//! false term before an `&`.

/// State of one open conditional block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// No branch has matched yet; the current branch is skipped.
    NotMatched,
    /// The current branch is taken.
    Matched,
    /// An earlier branch was taken; the rest are skipped.
    WasMatched,
}

/// Stack of open conditional blocks.
#[derive(Debug, Default)]
pub struct ConditionStack {
    frames: Vec<Branch>,
}

impl ConditionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// `if`: open a block whose first branch is taken when `matched`.
    pub fn open(&mut self, matched: bool) {
        self.frames.push(if matched {
            Branch::Matched
        } else {
            Branch::NotMatched
        });
    }

    /// `elseif`: evaluate `condition` only if no branch has matched yet.
    pub fn else_if(&mut self, condition: impl FnOnce() -> bool) {
        let next = match self.frames.pop() {
            Some(Branch::NotMatched) => {
                if condition() {
                    Branch::Matched
                } else {
                    Branch::NotMatched
                }
            }
            Some(_) => Branch::WasMatched,
            None => return,
        };
        self.frames.push(next);
    }

    /// `else`: taken only if no branch has matched yet.
    pub fn otherwise(&mut self) {
        let next = match self.frames.pop() {
            Some(Branch::NotMatched) => Branch::Matched,
            Some(_) => Branch::WasMatched,
            None => return,
        };
        self.frames.push(next);
    }

    /// `endif`: close the innermost block.
    pub fn close(&mut self) {
        self.frames.pop();
    }

    /// Whether lines are currently emitted.
    pub fn is_active(&self) -> bool {
        self.frames.iter().all(|b| *b == Branch::Matched)
    }

    /// Number of open blocks.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Innermost block state.
    pub fn top(&self) -> Option<Branch> {
        self.frames.last().copied()
    }
}

/// Comparison operator of a condition term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `=`: text equality.
    Equal,
    /// `!`: text inequality.
    NotEqual,
    /// `<`: integer less-than.
    Less,
    /// `>`: integer greater-than.
    Greater,
}

impl Comparison {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(Comparison::Equal),
            '!' => Some(Comparison::NotEqual),
            '<' => Some(Comparison::Less),
            '>' => Some(Comparison::Greater),
            _ => None,
        }
    }

    fn apply(self, left: &str, right: &str) -> bool {
        match self {
            Comparison::Equal => left == right,
            Comparison::NotEqual => left != right,
            Comparison::Less => parse_integer(left) < parse_integer(right),
            Comparison::Greater => parse_integer(left) > parse_integer(right),
        }
    }
}

/// Integer value of a comparison operand; anything unparsable counts as 0.
fn parse_integer(text: &str) -> i64 {
    let text = text.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(|f| f as i64))
        .unwrap_or(0)
}

/// One term of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// `name<op>value`
    Compare {
        name: String,
        op: Comparison,
        value: String,
    },
    /// A bare name, true when its value is non-empty and not `false` or `0`.
    Truthy(String),
}

impl Term {
    fn parse(text: &str) -> Self {
        match text.char_indices().find_map(|(i, c)| {
            Comparison::from_char(c).map(|op| (i, op))
        }) {
            Some((i, op)) => Term::Compare {
                name: text[..i].trim().to_string(),
                op,
                value: text[i + 1..].trim().to_string(),
            },
            None => Term::Truthy(text.trim().to_string()),
        }
    }

    fn evaluate(&self, lookup: &mut impl FnMut(&str) -> String) -> bool {
        match self {
            Term::Compare { name, op, value } => op.apply(&lookup(name), value),
            Term::Truthy(name) => {
                let value = lookup(name);
                !value.is_empty() && value != "false" && value != "0"
            }
        }
    }
}

/// How a term is chained to the result so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    And,
    Or,
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    first: Term,
    rest: Vec<(Joiner, Term)>,
}

impl Condition {
    /// Parse a condition such as `osc.wave=saw&voices>2`.
    pub fn parse(expr: &str) -> Self {
        let mut terms = Vec::new();
        let mut joiner = None;
        let mut start = 0;
        for (i, c) in expr.char_indices() {
            let next = match c {
                '&' => Joiner::And,
                '|' => Joiner::Or,
                _ => continue,
            };
            terms.push((joiner, Term::parse(&expr[start..i])));
            joiner = Some(next);
            start = i + 1;
        }
        terms.push((joiner, Term::parse(&expr[start..])));

        let mut terms = terms.into_iter();
        let first = terms
            .next()
            .map_or_else(|| Term::Truthy(String::new()), |(_, term)| term);
        let rest = terms
            .filter_map(|(joiner, term)| joiner.map(|j| (j, term)))
            .collect();
        Self { first, rest }
    }

    /// Evaluate left to right, resolving term names with `lookup`.
    pub fn evaluate(&self, mut lookup: impl FnMut(&str) -> String) -> bool {
        let mut result = self.first.evaluate(&mut lookup);
        for (joiner, term) in &self.rest {
            match joiner {
                Joiner::And if !result => return false,
                Joiner::Or if result => return true,
                _ => result = term.evaluate(&mut lookup),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn eval(expr: &str, values: &[(&str, &str)]) -> bool {
        let values: HashMap<&str, &str> = values.iter().copied().collect();
        Condition::parse(expr).evaluate(|name| values.get(name).copied().unwrap_or("").to_string())
    }

    #[test]
    fn test_text_comparisons() {
        assert!(eval("wave=saw", &[("wave", "saw")]));
        assert!(!eval("wave=saw", &[("wave", "sine")]));
        assert!(eval("wave!saw", &[("wave", "sine")]));
        assert!(eval("wave=", &[]));
    }

    #[test]
    fn test_integer_comparisons() {
        assert!(eval("count>2", &[("count", "10")]));
        assert!(!eval("count<2", &[("count", "10")]));
        assert!(eval("count<1", &[]));
        assert!(eval("level>0", &[("level", "3.7")]));
    }

    #[test]
    fn test_truthy_terms() {
        assert!(eval("flag", &[("flag", "true")]));
        assert!(!eval("flag", &[("flag", "false")]));
        assert!(!eval("flag", &[("flag", "0")]));
        assert!(!eval("flag", &[]));
    }

    #[test]
    fn test_left_to_right_without_precedence() {
        let values = [("a", "1"), ("b", "0"), ("c", "0")];
        // a=1 is true before `|`, so evaluation stops there.
        assert!(eval("a=1|b=1&c=1", &values));
        // a=0 is false, b=0 is true, then `&` evaluates c=1 which is false.
        assert!(!eval("a=0|b=0&c=1", &values));
        // a=0 is false before `&`, so the result is false regardless of the rest.
        assert!(!eval("a=0&b=1|c=0", &values));
    }

    #[test]
    fn test_short_circuit_skips_lookups() {
        let mut looked_up = Vec::new();
        let result = Condition::parse("a=x&b=y&c=z").evaluate(|name| {
            looked_up.push(name.to_string());
            String::new()
        });
        assert!(!result);
        assert_eq!(looked_up, vec!["a"]);
    }

    #[test]
    fn test_if_else_chain() {
        let mut stack = ConditionStack::new();
        stack.open(false);
        assert!(!stack.is_active());
        stack.else_if(|| true);
        assert!(stack.is_active());
        stack.otherwise();
        assert_eq!(stack.top(), Some(Branch::WasMatched));
        assert!(!stack.is_active());
        stack.close();
        assert!(stack.is_active());
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_elseif_not_evaluated_after_match() {
        let mut stack = ConditionStack::new();
        stack.open(true);
        stack.else_if(|| panic!("must not evaluate"));
        assert_eq!(stack.top(), Some(Branch::WasMatched));
    }

    #[test]
    fn test_else_taken_when_nothing_matched() {
        let mut stack = ConditionStack::new();
        stack.open(false);
        stack.else_if(|| false);
        stack.otherwise();
        assert!(stack.is_active());
    }

    #[test]
    fn test_nested_block_inside_skipped_branch_stays_inactive() {
        let mut stack = ConditionStack::new();
        stack.open(false);
        stack.open(true);
        assert!(!stack.is_active());
        stack.close();
        stack.otherwise();
        assert!(stack.is_active());
    }

    #[test]
    fn test_unbalanced_directives_are_ignored() {
        let mut stack = ConditionStack::new();
        stack.otherwise();
        stack.else_if(|| true);
        stack.close();
        assert!(stack.is_active());
        assert_eq!(stack.depth(), 0);
    }
}
