//! Response index — arena of responses with item- and user-keyed adjacency.
//!
//! Purpose
//! -------
//! Turn a flat list of `(user, item, answer)` records into the sparse
//! structure the EM engine walks: for every item, which users answered it
//! (and whether correctly); for every user, which items they answered.
//!
//! Key behaviors
//! -------------
//! - Ids are interned into dense `usize` indices in first-seen order; the
//!   original ids are kept for reporting.
//! - Responses live once in an arena; `by_item` / `by_user` hold arena
//!   positions, so each response appears in exactly one bucket of each.
//! - Each item's responders are split once into `right` / `wrong` dense user
//!   lists using the answer tolerance rule.
//!
//! Invariants & assumptions
//! ------------------------
//! - Built once, never mutated afterwards.
//! - Per-key insertion order follows input order, so two builds from the same
//!   record sequence are identical.
//! - No validation of answer tags beyond the tolerance rule; duplicated
//!   `(user, item)` pairs are kept as separate responses.
use crate::irt::{
    core::records::{ResponseId, ResponseRecord, is_correct, records_from_matrix},
    errors::IrtResult,
};
use ndarray::ArrayView2;
use std::collections::HashMap;

/// One response in dense-index form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response {
    pub user: usize,
    pub item: usize,
    pub tag: f64,
}

impl Response {
    pub fn is_correct(&self) -> bool {
        is_correct(self.tag)
    }
}

#[derive(Debug, Clone)]
pub struct ResponseIndex<U, I> {
    users: Vec<U>,
    items: Vec<I>,
    user_lookup: HashMap<U, usize>,
    item_lookup: HashMap<I, usize>,
    responses: Vec<Response>,
    by_item: Vec<Vec<usize>>,
    by_user: Vec<Vec<usize>>,
    right: Vec<Vec<usize>>,
    wrong: Vec<Vec<usize>>,
}

impl<U: ResponseId, I: ResponseId> ResponseIndex<U, I> {
    /// Build the index from a record sequence.
    pub fn build<R>(records: R) -> Self
    where
        R: IntoIterator<Item = ResponseRecord<U, I>>,
    {
        let mut index = Self {
            users: Vec::new(),
            items: Vec::new(),
            user_lookup: HashMap::new(),
            item_lookup: HashMap::new(),
            responses: Vec::new(),
            by_item: Vec::new(),
            by_user: Vec::new(),
            right: Vec::new(),
            wrong: Vec::new(),
        };

        for record in records {
            let user = intern(&mut index.users, &mut index.user_lookup, record.user);
            let item = intern(&mut index.items, &mut index.item_lookup, record.item);
            if user == index.by_user.len() {
                index.by_user.push(Vec::new());
            }
            if item == index.by_item.len() {
                index.by_item.push(Vec::new());
            }
            let pos = index.responses.len();
            index.responses.push(Response { user, item, tag: record.tag });
            index.by_user[user].push(pos);
            index.by_item[item].push(pos);
        }

        // Second pass: split every item's responders by correctness.
        index.right = vec![Vec::new(); index.items.len()];
        index.wrong = vec![Vec::new(); index.items.len()];
        for (item, positions) in index.by_item.iter().enumerate() {
            for &pos in positions {
                let response = index.responses[pos];
                if response.is_correct() {
                    index.right[item].push(response.user);
                } else {
                    index.wrong[item].push(response.user);
                }
            }
        }
        index
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    pub fn n_responses(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// User ids in first-seen order; position is the dense index.
    pub fn users(&self) -> &[U] {
        &self.users
    }

    /// Item ids in first-seen order; position is the dense index.
    pub fn items(&self) -> &[I] {
        &self.items
    }

    pub fn user_index(&self, user: &U) -> Option<usize> {
        self.user_lookup.get(user).copied()
    }

    pub fn item_index(&self, item: &I) -> Option<usize> {
        self.item_lookup.get(item).copied()
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Responses to dense item `item`, in input order.
    pub fn item_responses(&self, item: usize) -> impl Iterator<Item = &Response> + '_ {
        self.by_item[item].iter().map(move |&pos| &self.responses[pos])
    }

    /// Responses given by dense user `user`, in input order.
    pub fn user_responses(&self, user: usize) -> impl Iterator<Item = &Response> + '_ {
        self.by_user[user].iter().map(move |&pos| &self.responses[pos])
    }

    /// Dense ids of users who answered `item` correctly.
    pub fn right_users(&self, item: usize) -> &[usize] {
        &self.right[item]
    }

    /// Dense ids of users who answered `item` incorrectly.
    pub fn wrong_users(&self, item: usize) -> &[usize] {
        &self.wrong[item]
    }
}

impl ResponseIndex<i64, i64> {
    /// Parse an `N × 3` numeric matrix and build the index from it.
    pub fn from_matrix(rows: ArrayView2<'_, f64>) -> IrtResult<Self> {
        Ok(Self::build(records_from_matrix(rows)?))
    }
}

fn intern<T: ResponseId>(ids: &mut Vec<T>, lookup: &mut HashMap<T, usize>, id: T) -> usize {
    if let Some(&dense) = lookup.get(&id) {
        return dense;
    }
    let dense = ids.len();
    ids.push(id.clone());
    lookup.insert(id, dense);
    dense
}
