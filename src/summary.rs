//! Per-category spending totals for the ledger.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::Expense;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: usize,
    /// Share of the overall total, 0-100.
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub total: f64,
    pub count: usize,
    /// Largest total first; equal totals by category name.
    pub categories: Vec<CategoryTotal>,
}

pub fn summarize(expenses: &[Expense]) -> ExpenseSummary {
    let mut by_category: HashMap<&str, (f64, usize)> = HashMap::new();
    for expense in expenses {
        let entry = by_category.entry(expense.category.as_str()).or_default();
        entry.0 += expense.amount;
        entry.1 += 1;
    }

    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    let mut categories: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, (sum, count))| CategoryTotal {
            category: category.to_string(),
            total: sum,
            count,
            share_pct: if total > 0.0 { sum * 100.0 / total } else { 0.0 },
        })
        .collect();

    categories.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    });

    ExpenseSummary {
        total,
        count: expenses.len(),
        categories,
    }
}
