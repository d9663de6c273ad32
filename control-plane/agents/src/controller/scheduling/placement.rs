//! Splits a requested size into brick sets and places every brick of a set on a distinct
//! node (and a distinct zone when strict zone checking is enabled).
//! The number of sets doubles until the bricks fit, within the bounds of the brick size and
//! the maximum number of bricks of a volume.

use super::{Allocator, DeviceCandidate};
use crate::{controller::config::CoreConfig, errors::SvcError, operations::helpers::get_spec};
use std::collections::{HashMap, HashSet};
use stor_port::{
    transport_api::ResourceKind,
    types::v0::{
        store::{brick::BrickSpec, cluster::ClusterSpec, definitions::Transaction},
        transport::{BrickId, ClusterId, DeviceId, Durability, NodeId, VolumeId},
    },
};

/// Mount path of a brick on its node.
pub fn brick_path(device: &DeviceId, brick: &BrickId) -> String {
    format!(
        "{}/vg_{}/brick_{}/brick",
        utils::BRICK_MOUNT_ROOT,
        device,
        brick
    )
}

/// Place the bricks of `size_gib` of `volume` in `cluster`.
/// Returns the bricks ordered by brick set, not yet written to the store.
pub fn place_volume_bricks(
    txn: &Transaction<'_>,
    config: &CoreConfig,
    allocator: &dyn Allocator,
    cluster: &ClusterId,
    volume: &VolumeId,
    size_gib: u64,
    durability: Durability,
) -> Result<Vec<BrickSpec>, SvcError> {
    let cluster_spec: ClusterSpec = get_spec(txn, ResourceKind::Cluster, cluster)?;
    if cluster_spec.nodes.is_empty() {
        return Err(SvcError::EmptyCluster {
            cluster: cluster.clone(),
        });
    }
    if !durability.is_valid() {
        return Err(SvcError::InvalidArguments {
            message: format!("invalid durability {durability}"),
        });
    }

    let size_kib = size_gib * utils::GIB_TO_KIB;
    let mut num_sets = 1usize;
    let mut out_of_space = false;
    loop {
        let brick_size_kib = durability.brick_size_kib(size_kib / num_sets as u64);
        let bricks = num_sets * durability.set_size();
        if brick_size_kib < config.brick_min_size_kib() {
            return Err(match out_of_space {
                true => SvcError::NoSpace { size_gib },
                false => SvcError::MinimumBrickSize {
                    size_kib: brick_size_kib,
                    min_kib: config.brick_min_size_kib(),
                },
            });
        }
        if bricks > config.brick_max_num() {
            return Err(match out_of_space {
                true => SvcError::NoSpace { size_gib },
                false => SvcError::MaxBricks {
                    size_gib,
                    bricks,
                    max: config.brick_max_num(),
                },
            });
        }
        if brick_size_kib > config.brick_max_size_kib() {
            num_sets *= 2;
            continue;
        }

        let mut placer = Placer::new(txn, config, allocator, cluster);
        match placer.place_sets(volume, num_sets, durability.set_size(), brick_size_kib) {
            Ok(bricks) => {
                tracing::debug!(
                    volume.id = %volume,
                    sets = num_sets,
                    brick.size_kib = brick_size_kib,
                    "Placed volume bricks"
                );
                return Ok(bricks);
            }
            Err(SvcError::NoSpace { .. }) => {
                out_of_space = true;
                num_sets *= 2;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Place a brick which replaces a brick of a set.
/// The replacement avoids `exclude`, as well as the nodes (and zones) of the `siblings`.
#[allow(clippy::too_many_arguments)]
pub fn place_replacement_brick(
    txn: &Transaction<'_>,
    config: &CoreConfig,
    allocator: &dyn Allocator,
    cluster: &ClusterId,
    volume: &VolumeId,
    size_kib: u64,
    exclude: &DeviceId,
    siblings: &[(NodeId, u32)],
) -> Result<BrickSpec, SvcError> {
    let mut placer = Placer::new(txn, config, allocator, cluster);
    placer.exclude.insert(exclude.clone());
    let mut set = SetState::default();
    for (node, zone) in siblings {
        set.nodes.insert(node.clone());
        set.zones.insert(*zone);
    }
    placer
        .place_brick(volume, &mut set, size_kib)?
        .ok_or(SvcError::NoSpace {
            size_gib: size_kib / utils::GIB_TO_KIB,
        })
}

#[derive(Default)]
struct SetState {
    nodes: HashSet<NodeId>,
    zones: HashSet<u32>,
}

/// Working copy of the free space of the devices while bricks are being placed.
struct Placer<'a, 'b> {
    txn: &'a Transaction<'b>,
    config: &'a CoreConfig,
    allocator: &'a dyn Allocator,
    cluster: &'a ClusterId,
    free: HashMap<DeviceId, u64>,
    exclude: HashSet<DeviceId>,
}

impl<'a, 'b> Placer<'a, 'b> {
    fn new(
        txn: &'a Transaction<'b>,
        config: &'a CoreConfig,
        allocator: &'a dyn Allocator,
        cluster: &'a ClusterId,
    ) -> Self {
        Self {
            txn,
            config,
            allocator,
            cluster,
            free: HashMap::new(),
            exclude: HashSet::new(),
        }
    }

    fn place_sets(
        &mut self,
        volume: &VolumeId,
        num_sets: usize,
        set_size: usize,
        brick_size_kib: u64,
    ) -> Result<Vec<BrickSpec>, SvcError> {
        let mut bricks = Vec::with_capacity(num_sets * set_size);
        for _ in 0 .. num_sets {
            let mut set = SetState::default();
            for _ in 0 .. set_size {
                match self.place_brick(volume, &mut set, brick_size_kib)? {
                    Some(brick) => bricks.push(brick),
                    None => {
                        return Err(SvcError::NoSpace {
                            size_gib: brick_size_kib / utils::GIB_TO_KIB,
                        })
                    }
                }
            }
        }
        Ok(bricks)
    }

    fn place_brick(
        &mut self,
        volume: &VolumeId,
        set: &mut SetState,
        size_kib: u64,
    ) -> Result<Option<BrickSpec>, SvcError> {
        let id = BrickId::new();
        let candidates = self.allocator.candidates(self.txn, self.cluster, &id)?;
        if candidates.is_empty() {
            return Err(SvcError::NoStorage {
                cluster: self.cluster.clone(),
            });
        }
        let Some(candidate) = candidates
            .into_iter()
            .find(|candidate| self.fits(set, candidate, size_kib))
        else {
            return Ok(None);
        };
        if let Some(free) = self.free.get_mut(&candidate.device.id) {
            *free -= size_kib;
        }
        set.nodes.insert(candidate.node.clone());
        set.zones.insert(candidate.zone);
        Ok(Some(BrickSpec {
            path: brick_path(&candidate.device.id, &id),
            id,
            device: candidate.device.id,
            node: candidate.node,
            volume: volume.clone(),
            size_kib,
            origin: None,
            pending: None,
        }))
    }

    fn fits(&mut self, set: &SetState, candidate: &DeviceCandidate, size_kib: u64) -> bool {
        if self.exclude.contains(&candidate.device.id) || set.nodes.contains(&candidate.node) {
            return false;
        }
        if self.config.strict_zone_checking() && set.zones.contains(&candidate.zone) {
            return false;
        }
        let free = self
            .free
            .entry(candidate.device.id.clone())
            .or_insert(candidate.device.free_kib);
        *free >= size_kib
    }
}
