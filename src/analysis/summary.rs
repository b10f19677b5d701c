//! Model summary: the model flattened into union sets and relations.
//!
//! Every later phase works on these unions rather than on the statement
//! list. The summary is a pure function of the model and is recomputed
//! whenever statements are added.

use crate::ir::Model;
use crate::polyhedral::{UnionMap, UnionSet};
use crate::utils::errors::PolyResult;
use log::debug;

/// Global domains, accesses and dependencies of a model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelSummary {
    /// Union of all statement domains
    pub domains: UnionSet,
    /// Statement -> array, for writing accesses
    pub write_relations: UnionMap,
    /// Statement -> array, for reading accesses
    pub read_relations: UnionMap,
    /// Self orderings and the global clock
    pub order_relations: UnionMap,
    /// Producer instance -> consumer instance
    pub dependencies: UnionMap,
}

impl ModelSummary {
    pub fn new(model: &Model) -> PolyResult<Self> {
        let mut domains = UnionSet::new();
        let mut write_relations = UnionMap::new();
        let mut read_relations = UnionMap::new();
        let mut order_relations = UnionMap::new();

        for stmt in &model.statements {
            domains.add(stmt.domain.clone());
            for access in &stmt.accesses {
                let relation = access.relation.intersect_domain(&stmt.domain);
                if access.writing {
                    write_relations.add(relation.clone());
                }
                if access.reading {
                    read_relations.add(relation);
                }
            }
            if let Some(order) = &stmt.self_order {
                order_relations.add(order.clone());
            }
        }
        if let Some(clock) = &model.clock {
            order_relations = order_relations.union(clock);
        }

        let flow = write_relations
            .apply_range(&read_relations.reverse())
            .intersect_domain(&domains)
            .intersect_range(&domains);
        let order = order_relations.intersect_domain(&domains).intersect_range(&domains);
        let dependencies = flow.union(&order).coalesce()?;

        debug!(
            "summary: {} domains, {} writes, {} reads, {} dependency spaces",
            domains.len(),
            write_relations.len(),
            read_relations.len(),
            dependencies.len()
        );

        Ok(Self { domains, write_relations, read_relations, order_relations, dependencies })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ModelBuilder, StmtId};
    use crate::polyhedral::{SpaceKey, Tuple};

    fn producer_consumer() -> Model {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let p = b.statement("p", &[(0, None)]).unwrap();
        let c = b.statement("c", &[(1, None)]).unwrap();
        b.write(p, x, &[vec![1, 0]]).unwrap();
        b.read(c, x, &[vec![1, -1]]).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_dependencies() {
        let model = producer_consumer();
        let summary = ModelSummary::new(&model).unwrap();
        assert_eq!(summary.domains.len(), 2);
        let key = SpaceKey {
            input: Some(Tuple::statement(StmtId(0), 1)),
            output: Tuple::statement(StmtId(1), 1),
        };
        let dep = summary.dependencies.get(&key).unwrap();
        // p[i] feeds c[i + 1]
        assert!(dep.contains(&[3, 4]).unwrap());
        assert!(!dep.contains(&[3, 3]).unwrap());
        assert!(summary.order_relations.is_empty().unwrap());
    }

    #[test]
    fn test_idempotent() {
        let model = producer_consumer();
        let a = ModelSummary::new(&model).unwrap();
        let b = ModelSummary::new(&model).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_self_order_is_dependency() {
        let mut b = ModelBuilder::new();
        let s = b.statement("acc", &[(0, Some(7))]).unwrap();
        b.self_order(s, &[vec![1, 1]]).unwrap();
        let model = b.build().unwrap();
        let summary = ModelSummary::new(&model).unwrap();
        let key = SpaceKey { input: Some(Tuple::statement(s, 1)), output: Tuple::statement(s, 1) };
        let dep = summary.dependencies.get(&key).unwrap();
        assert!(dep.contains(&[2, 3]).unwrap());
        assert!(!dep.contains(&[7, 8]).unwrap());
    }
}
