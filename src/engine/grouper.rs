// ==========================================
// 联系人导入去重系统 - 批内重复分组
// ==========================================
// 职责: 按"共享任一规范化邮箱/电话"把行划分为连通分量
// 红线: 分组必须传递（A~B 且 B~C ⇒ A、B、C 同组）
// ==========================================
// 输入: 完成字段映射的行
// 输出: DuplicateGroup 列表（按组内首行排序，组内行保持原顺序）
// ==========================================

use crate::domain::contact::ContactRecord;
use crate::domain::dedup::{DuplicateGroup, NormalizedIdentifiers};
use crate::engine::normalizer::identifiers_of;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// 分组 ID 格式: grp_0001
pub fn group_id_for(index: usize) -> String {
    format!("grp_{:04}", index + 1)
}

// ==========================================
// UnionFind - 并查集（路径压缩 + 按大小合并）
// ==========================================
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}

// ==========================================
// DuplicateGrouper
// ==========================================
pub struct DuplicateGrouper;

impl DuplicateGrouper {
    pub fn new() -> Self {
        Self
    }

    /// 批内分组
    ///
    /// # 说明
    /// - 无任何标识的行不参与分组
    /// - 有标识但无伙伴的行形成单行组（仍需外部匹配）
    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    pub fn group(&self, rows: &[ContactRecord]) -> Vec<DuplicateGroup> {
        let identifiers: Vec<NormalizedIdentifiers> = rows.iter().map(identifiers_of).collect();
        let mut uf = UnionFind::new(rows.len());

        // 标识 → 首个持有该标识的行下标
        let mut first_email: HashMap<&str, usize> = HashMap::new();
        let mut first_phone: HashMap<&str, usize> = HashMap::new();

        for (idx, ids) in identifiers.iter().enumerate() {
            for email in &ids.emails {
                match first_email.get(email.as_str()) {
                    Some(&owner) => uf.union(owner, idx),
                    None => {
                        first_email.insert(email.as_str(), idx);
                    }
                }
            }
            for phone in &ids.phones {
                match first_phone.get(phone.as_str()) {
                    Some(&owner) => uf.union(owner, idx),
                    None => {
                        first_phone.insert(phone.as_str(), idx);
                    }
                }
            }
        }

        // 按首行顺序收集分量
        let mut root_to_group: HashMap<usize, usize> = HashMap::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        for idx in 0..rows.len() {
            if identifiers[idx].is_empty() {
                continue;
            }
            let root = uf.find(idx);
            let slot = *root_to_group.entry(root).or_insert_with(|| {
                members.push(Vec::new());
                members.len() - 1
            });
            members[slot].push(idx);
        }

        let groups: Vec<DuplicateGroup> = members
            .into_iter()
            .enumerate()
            .map(|(g, idxs)| {
                let mut ids = NormalizedIdentifiers::default();
                for &i in &idxs {
                    ids.extend(&identifiers[i]);
                }
                DuplicateGroup {
                    group_id: group_id_for(g),
                    row_numbers: idxs.iter().map(|&i| rows[i].row_number).collect(),
                    identifiers: ids,
                }
            })
            .collect();

        debug!(
            group_count = groups.len(),
            multi_row_groups = groups.iter().filter(|g| g.has_internal_duplicates()).count(),
            "批内分组完成"
        );
        groups
    }
}

impl Default for DuplicateGrouper {
    fn default() -> Self {
        Self::new()
    }
}
