// ============================================================
// Layer 3 — Parameter Group Plans
// ============================================================
// One optimizer group per trainable component, each with its
// own base learning rate. The plan is rebuilt from scratch at
// every stage transition:
//
//   stage 1:   [extractor @ lr, branch 0 @ lr]
//   stage n>1: [extractor @ 0, branch n-1 @ lr, branch 0..n-2 @ 0]
//
// A group with base rate 0 is frozen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Extractor,
    /// 0-based branch index (creation order).
    Branch(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub component: Component,
    pub base_lr:   f64,
}

impl GroupSpec {
    pub fn trainable(&self) -> bool {
        self.base_lr != 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPlan {
    groups: Vec<GroupSpec>,
}

impl GroupPlan {
    /// Stage 1: extractor and first branch train jointly.
    pub fn joint(base_lr: f64) -> Self {
        Self {
            groups: vec![
                GroupSpec { component: Component::Extractor, base_lr },
                GroupSpec { component: Component::Branch(0), base_lr },
            ],
        }
    }

    /// Later stages: only the newest of `ensemble_size` branches trains.
    pub fn newest_only(base_lr: f64, ensemble_size: usize) -> Self {
        let newest = ensemble_size.saturating_sub(1);
        let mut groups = vec![
            GroupSpec { component: Component::Extractor, base_lr: 0.0 },
            GroupSpec { component: Component::Branch(newest), base_lr },
        ];
        groups.extend((0..newest).map(|b| GroupSpec { component: Component::Branch(b), base_lr: 0.0 }));
        Self { groups }
    }

    /// Plan for a 1-based stage of an ensemble of `ensemble_size` branches.
    pub fn for_stage(base_lr: f64, ensemble_size: usize) -> Self {
        if ensemble_size <= 1 {
            Self::joint(base_lr)
        } else {
            Self::newest_only(base_lr, ensemble_size)
        }
    }

    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    pub fn base_lr_of(&self, component: Component) -> f64 {
        self.groups
            .iter()
            .find(|g| g.component == component)
            .map(|g| g.base_lr)
            .unwrap_or(0.0)
    }

    pub fn trainable_count(&self) -> usize {
        self.groups.iter().filter(|g| g.trainable()).count()
    }
}
