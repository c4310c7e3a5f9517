//! Nested segment trees built from an ordered list of hierarchy columns.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

/// Value of a hierarchy column mapped to the tree of values below it.
/// Leaves are empty trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentTree(BTreeMap<String, SegmentTree>);

impl SegmentTree {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, value: &str) -> Option<&Self> {
        self.0.get(value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of levels below this node.
    pub fn depth(&self) -> usize {
        self.0.values().map(|child| child.depth() + 1).max().unwrap_or(0)
    }

    /// Walks `path`, creating missing nodes on the way.
    fn node_mut(&mut self, path: &[String]) -> &mut Self {
        path.iter()
            .fold(self, |node, value| node.0.entry(value.clone()).or_default())
    }
}

/// Source of filtered distinct values, one query per call.
pub trait DistinctSource {
    /// Distinct non-null values of `column` among rows where every
    /// `(filter_column, value)` pair matches.
    fn distinct(
        &mut self,
        column: &str,
        filters: &[(String, String)],
    ) -> impl Future<Output = Result<Vec<String>>>;
}

/// Builds the tree for `columns` (outermost first).
///
/// Every node's children come from one filtered-distinct query constrained
/// by the values on its path, so depth never exceeds `columns.len()`. The
/// number of queries equals the number of non-leaf nodes plus one.
pub async fn build_hierarchy<S: DistinctSource>(
    source: &mut S,
    columns: &[String],
) -> Result<SegmentTree> {
    let mut root = SegmentTree::default();
    let mut pending: Vec<Vec<String>> = vec![Vec::new()];

    while let Some(path) = pending.pop() {
        let depth = path.len();
        let Some(column) = columns.get(depth) else {
            continue;
        };

        let filters: Vec<(String, String)> = columns
            .iter()
            .cloned()
            .zip(path.iter().cloned())
            .collect();
        let values = source.distinct(column, &filters).await?;

        let node = root.node_mut(&path);
        for value in values {
            node.0.entry(value.clone()).or_default();
            if depth + 1 < columns.len() {
                let mut child_path = path.clone();
                child_path.push(value);
                pending.push(child_path);
            }
        }
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::{BTreeSet, HashMap};

    /// In-memory table: each row maps column name to value.
    struct Rows {
        rows: Vec<HashMap<String, String>>,
        queries: usize,
    }

    impl Rows {
        fn new(columns: &[&str], data: &[&[&str]]) -> Self {
            let rows = data
                .iter()
                .map(|values| {
                    columns
                        .iter()
                        .zip(values.iter())
                        .filter(|(_, v)| !v.is_empty())
                        .map(|(c, v)| ((*c).to_owned(), (*v).to_owned()))
                        .collect()
                })
                .collect();
            Self { rows, queries: 0 }
        }
    }

    impl DistinctSource for Rows {
        async fn distinct(
            &mut self,
            column: &str,
            filters: &[(String, String)],
        ) -> crate::error::Result<Vec<String>> {
            self.queries += 1;
            let values: BTreeSet<String> = self
                .rows
                .iter()
                .filter(|row| filters.iter().all(|(c, v)| row.get(c) == Some(v)))
                .filter_map(|row| row.get(column).cloned())
                .collect();
            Ok(values.into_iter().collect())
        }
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[tokio::test]
    async fn test_two_level_tree() -> Result<()> {
        let mut source = Rows::new(
            &["segment", "sub_segment"],
            &[
                &["Cars", "EV"],
                &["Cars", "ICE"],
                &["Cars", "EV"],
                &["Bikes", "E-Bike"],
                &["Trucks", ""],
            ],
        );

        let tree = build_hierarchy(&mut source, &cols(&["segment", "sub_segment"])).await?;

        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["Bikes", "Cars", "Trucks"]);
        assert_eq!(
            tree.child("Cars").map(|c| c.keys().collect::<Vec<_>>()),
            Some(vec!["EV", "ICE"])
        );
        assert_eq!(tree.child("Bikes").map(SegmentTree::len), Some(1));
        assert_eq!(tree.child("Trucks").map(SegmentTree::is_empty), Some(true));
        assert_eq!(tree.depth(), 2);
        // root + one query per top-level value
        assert_eq!(source.queries, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_three_levels_filter_by_full_path() -> Result<()> {
        let mut source = Rows::new(
            &["segment", "sub_segment", "sub_sub_segment"],
            &[
                &["A", "x", "1"],
                &["A", "y", "2"],
                &["B", "x", "3"],
            ],
        );

        let tree = build_hierarchy(
            &mut source,
            &cols(&["segment", "sub_segment", "sub_sub_segment"]),
        )
        .await?;

        let ax = tree.child("A").and_then(|a| a.child("x"));
        assert_eq!(ax.map(|n| n.keys().collect::<Vec<_>>()), Some(vec!["1"]));
        let bx = tree.child("B").and_then(|b| b.child("x"));
        assert_eq!(bx.map(|n| n.keys().collect::<Vec<_>>()), Some(vec!["3"]));
        assert_eq!(tree.depth(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_columns_gives_empty_tree() -> Result<()> {
        let mut source = Rows::new(&["segment"], &[&["A"]]);
        let tree = build_hierarchy(&mut source, &[]).await?;
        assert!(tree.is_empty());
        assert_eq!(source.queries, 0);
        Ok(())
    }

    #[test]
    fn test_serialized_shape() -> Result<()> {
        let tree: SegmentTree = serde_json::from_str(r#"{"Cars":{"EV":{}},"Bikes":{}}"#)?;
        assert_eq!(
            serde_json::to_string(&tree)?,
            r#"{"Bikes":{},"Cars":{"EV":{}}}"#
        );
        Ok(())
    }
}
