//! Rootless UID/GID remapping for a private user namespace.
//!
//! The invoking host user becomes root inside the container, the IDs below
//! it shift up by one, and the IDs above it map onto themselves:
//!
//! ```text
//! container            host
//! uid ........... ->   0
//! 0 .. uid-1      ->   1 .. uid
//! uid+1 .. 65536  ->   uid+1 .. 65536
//! ```

use serde::{Deserialize, Serialize};

/// Size of the remapped ID block; the invoking user's own ID comes on top.
pub const ID_SPACE: u32 = 65536;

/// One contiguous range of a UID or GID map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct IdMap {
    /// First ID of the range inside the container.
    pub container_id: u32,
    /// First ID of the range on the host.
    pub host_id: u32,
    /// Length of the range. Zero-length ranges are valid.
    pub size: u32,
}

impl IdMap {
    /// A range of `size` IDs starting at `container_id` / `host_id`.
    pub const fn new(container_id: u32, host_id: u32, size: u32) -> Self {
        Self {
            container_id,
            host_id,
            size,
        }
    }

    /// Container IDs covered by this range.
    pub fn container_range(&self) -> std::ops::Range<u64> {
        let start = u64::from(self.container_id);
        start..start + u64::from(self.size)
    }
}

/// UID and GID tables for a user namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct IdMappings {
    /// Map host UIDs into the namespace.
    pub host_uid_mapping: bool,
    /// Map host GIDs into the namespace.
    pub host_gid_mapping: bool,
    /// UID map.
    pub uid_map: Vec<IdMap>,
    /// GID map, identical in shape to the UID map.
    pub gid_map: Vec<IdMap>,
}

impl IdMappings {
    /// Builds the three-range rootless table for `host_uid`.
    ///
    /// The lower and upper ranges together always span [`ID_SPACE`] IDs, so
    /// with the user's own range the table covers container IDs `0..=65536`.
    /// For `host_uid > 65536` the upper range saturates to zero length and
    /// the table no longer covers that space; see [`Self::covers_id_space`].
    pub fn rootless(host_uid: u32) -> Self {
        let above = host_uid.saturating_add(1);
        let table = vec![
            IdMap::new(host_uid, 0, 1),
            IdMap::new(0, 1, host_uid),
            IdMap::new(above, above, ID_SPACE.saturating_sub(host_uid)),
        ];
        Self {
            host_uid_mapping: true,
            host_gid_mapping: true,
            uid_map: table.clone(),
            gid_map: table,
        }
    }

    /// Returns `true` if the UID ranges tile container IDs `0..=ID_SPACE`
    /// without gaps or overlaps.
    pub fn covers_id_space(&self) -> bool {
        let mut ranges: Vec<_> = self.uid_map.iter().map(IdMap::container_range).collect();
        ranges.sort_by_key(|r| (r.start, r.end));
        let mut next = 0;
        for r in ranges.iter().filter(|r| !r.is_empty()) {
            if r.start != next {
                return false;
            }
            next = r.end;
        }
        next == u64::from(ID_SPACE) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: &IdMap, b: &IdMap) -> bool {
        let (ra, rb) = (a.container_range(), b.container_range());
        ra.start < rb.end && rb.start < ra.end
    }

    #[test]
    fn typical_desktop_user() {
        let m = IdMappings::rootless(1000);
        assert_eq!(
            m.uid_map,
            [
                IdMap::new(1000, 0, 1),
                IdMap::new(0, 1, 1000),
                IdMap::new(1001, 1001, 64536),
            ]
        );
        assert_eq!(m.uid_map, m.gid_map);
        assert!(m.host_uid_mapping && m.host_gid_mapping);
    }

    #[test]
    fn root_gets_an_empty_middle_range() {
        let m = IdMappings::rootless(0);
        assert_eq!(m.uid_map[1], IdMap::new(0, 1, 0));
        assert_eq!(m.uid_map[2], IdMap::new(1, 1, 65536));
        assert!(m.covers_id_space());
    }

    #[test]
    fn sizes_sum_and_ranges_are_disjoint() {
        for uid in (0..=ID_SPACE).step_by(97).chain([1, 999, 1000, 65535, 65536]) {
            let m = IdMappings::rootless(uid);
            assert!(m.covers_id_space(), "uid {uid}");
            assert_eq!(m.uid_map[1].size + m.uid_map[2].size, ID_SPACE, "uid {uid}");
            let t = &m.uid_map;
            for (i, a) in t.iter().enumerate() {
                for b in &t[i + 1..] {
                    assert!(!overlaps(a, b), "uid {uid}: {a:?} overlaps {b:?}");
                }
            }
        }
    }

    #[test]
    fn oversized_uid_saturates() {
        let m = IdMappings::rootless(70_000);
        assert_eq!(m.uid_map[2].size, 0);
        assert!(!m.covers_id_space());
    }
}
