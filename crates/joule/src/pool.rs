use std::collections::BTreeSet;
use std::fmt;

use smallvec::SmallVec;

use crate::common::ids::HostId;
use crate::common::utils::format_comma_delimited;

/// Hosts granted to a single job. Ids are kept sorted ascending and are
/// disjoint from every other live allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    hosts: SmallVec<[HostId; 4]>,
}

impl Allocation {
    pub fn new(mut hosts: SmallVec<[HostId; 4]>) -> Self {
        hosts.sort_unstable();
        Allocation { hosts }
    }

    #[inline]
    pub fn hosts(&self) -> &[HostId] {
        &self.hosts
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.hosts.len() as u32
    }

    /// Compact ascending wire form: contiguous runs are hyphenated,
    /// e.g. `0-2,5,7-8`.
    pub fn to_compact_string(&self) -> String {
        let mut ranges: Vec<String> = Vec::new();
        let mut ids = self.hosts.iter().map(|id| id.as_num()).peekable();
        while let Some(start) = ids.next() {
            let mut end = start;
            while ids.peek() == Some(&(end + 1)) {
                end = ids.next().unwrap();
            }
            if start == end {
                ranges.push(start.to_string());
            } else {
                ranges.push(format!("{}-{}", start, end));
            }
        }
        format_comma_delimited(ranges)
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_compact_string())
    }
}

/// Free-host set of the platform. Allocation picks the lowest free ids,
/// which keeps the choice deterministic and tends to produce contiguous
/// ranges on a quiet platform.
#[derive(Debug)]
pub struct HostPool {
    nb_hosts: u32,
    free: BTreeSet<HostId>,
}

impl HostPool {
    pub fn new(nb_hosts: u32) -> Self {
        HostPool {
            nb_hosts,
            free: (0..nb_hosts).map(HostId::new).collect(),
        }
    }

    #[inline]
    pub fn nb_hosts(&self) -> u32 {
        self.nb_hosts
    }

    #[inline]
    pub fn free_count(&self) -> u32 {
        self.free.len() as u32
    }

    #[inline]
    pub fn busy_count(&self) -> u32 {
        self.nb_hosts - self.free_count()
    }

    pub fn free_hosts(&self) -> impl Iterator<Item = HostId> + '_ {
        self.free.iter().copied()
    }

    /// Takes `width` lowest free ids, or nothing if the pool is too small.
    pub fn try_allocate(&mut self, width: u32) -> Option<Allocation> {
        if width == 0 || self.free_count() < width {
            return None;
        }
        let hosts: SmallVec<[HostId; 4]> =
            self.free.iter().copied().take(width as usize).collect();
        for id in &hosts {
            self.free.remove(id);
        }
        Some(Allocation::new(hosts))
    }

    /// Returns hosts to the free set. Double release is a programming error.
    pub fn release(&mut self, allocation: &Allocation) {
        for id in allocation.hosts() {
            assert!(
                id.as_num() < self.nb_hosts,
                "released host {} outside of platform",
                id
            );
            assert!(self.free.insert(*id), "host {} released twice", id);
        }
    }
}
