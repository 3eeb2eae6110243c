//! Horizontal sync: discovery, planning, execution, cascade.
//!
//! The driver locks the local vault, scans it into an ephemeral index,
//! decides an action per (note, declared peer) pair against the persisted
//! baselines, executes the resulting plans, and finally recurses into peers
//! not yet visited.

mod decide;
mod execute;
mod plan;

pub use decide::{DecideInput, SyncDecision, decide};
pub use plan::SyncPlan;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::CastConfig;
use crate::conflict::{AutoKeepLocal, ConflictUi, TerminalUi};
use crate::errors::CastError;
use crate::fsutil;
use crate::index::EphemeralIndex;
use crate::lockfile::VaultLock;
use crate::registry::{CastHome, Registry};
use crate::syncstate::SyncState;
use crate::types::PeerMode;

/// Options for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Restrict to these peer names; empty means all declared peers.
    pub peer_filter: Vec<String>,
    /// Restrict to a single relpath or cast-id.
    pub file_filter: Option<String>,
    pub dry_run: bool,
    pub non_interactive: bool,
    pub cascade: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            peer_filter: Vec::new(),
            file_filter: None,
            dry_run: false,
            non_interactive: true,
            cascade: true,
        }
    }
}

/// Merge two run exit codes under the ordering `0 < 1 < 3 < 2`.
#[must_use]
pub fn merge_exit(a: i32, b: i32) -> i32 {
    fn rank(code: i32) -> i32 {
        match code {
            0 => 0,
            1 => 1,
            3 => 2,
            _ => 3,
        }
    }
    if rank(b) > rank(a) { b } else { a }
}

/// A resolved peer for the duration of one run.
struct PeerCtx {
    root: PathBuf,
    vault: PathBuf,
    index: EphemeralIndex,
}

enum PlanOutcome {
    Done,
    Noop,
    ConflictSkipped,
}

/// Horizontal sync coordinator for one cast root.
pub struct HorizontalSync {
    root: PathBuf,
    vault_path: PathBuf,
    config: CastConfig,
    syncstate: SyncState,
    home: CastHome,
    registry: Registry,
}

impl HorizontalSync {
    /// Open a cast root for syncing.
    ///
    /// # Errors
    /// Config or registry errors abort before any lock is taken.
    pub fn new(root: &Path, home: &CastHome) -> Result<Self, CastError> {
        let root = fsutil::canonicalize_lossy(root);
        let config = CastConfig::load(&root)?;
        let syncstate = SyncState::load(&root)?;
        let registry = Registry::load(home)?;
        let vault_path = config.vault_path(&root);
        Ok(Self { root, vault_path, config, syncstate, home: home.clone(), registry })
    }

    #[must_use]
    pub fn config(&self) -> &CastConfig {
        &self.config
    }

    /// Run horizontal sync, optionally cascading to peers-of-peers. Returns
    /// the run exit code (`0` clean, `1` warnings, `3` unresolved
    /// conflicts).
    ///
    /// # Errors
    /// `LockBusy` and config errors mean the run could not start (exit 2 at
    /// the process boundary).
    pub fn sync(&mut self, opts: &SyncOptions) -> Result<i32, CastError> {
        let mut ui: Box<dyn ConflictUi> =
            if opts.non_interactive { Box::new(AutoKeepLocal) } else { Box::new(TerminalUi) };
        self.sync_with_ui(opts, ui.as_mut())
    }

    /// Like [`Self::sync`] with an explicit conflict collaborator.
    ///
    /// # Errors
    /// See [`Self::sync`].
    pub fn sync_with_ui(
        &mut self,
        opts: &SyncOptions,
        ui: &mut dyn ConflictUi,
    ) -> Result<i32, CastError> {
        let mut visited = BTreeSet::new();
        self.sync_inner(opts, ui, &mut visited)
    }

    fn sync_inner(
        &mut self,
        opts: &SyncOptions,
        ui: &mut dyn ConflictUi,
        visited: &mut BTreeSet<PathBuf>,
    ) -> Result<i32, CastError> {
        let _lock = VaultLock::acquire(&self.root)?;
        visited.insert(self.root.clone());

        let (mut code, peers) = self.sync_core(opts, ui)?;
        if !opts.cascade {
            return Ok(code);
        }

        for name in peers {
            let Some(entry) = self.registry.resolve_by_name(&name) else { continue };
            let peer_root = fsutil::canonicalize_lossy(&entry.root);
            if visited.contains(&peer_root) {
                continue;
            }
            let sub = HorizontalSync::new(&peer_root, &self.home).and_then(|mut hs| {
                let sub_opts = SyncOptions { peer_filter: Vec::new(), ..opts.clone() };
                hs.sync_inner(&sub_opts, ui, visited)
            });
            match sub {
                Ok(sub_code) => code = merge_exit(code, sub_code),
                Err(e) => {
                    log::warn!("cascade sync failed for peer '{name}' at {}: {e}", peer_root.display());
                    code = merge_exit(code, 1);
                }
            }
        }
        Ok(code)
    }

    /// Single-root core run: index, plan, execute. Returns the exit code and
    /// the peers discovered for cascading.
    fn sync_core(
        &mut self,
        opts: &SyncOptions,
        ui: &mut dyn ConflictUi,
    ) -> Result<(i32, BTreeSet<String>), CastError> {
        log::info!("indexing local vault: {}", self.vault_path.display());
        let mut local_index = EphemeralIndex::new();
        local_index.scan(&self.vault_path, true, opts.file_filter.as_deref())?;

        let mut peers = local_index.all_peers();
        peers.remove(&self.config.cast_name); // self-peers are always skipped
        if !opts.peer_filter.is_empty() {
            peers.retain(|p| opts.peer_filter.contains(p));
        }
        log::info!("found peers: {peers:?}");

        let mut warnings = false;
        let mut peer_ctx: BTreeMap<String, PeerCtx> = BTreeMap::new();
        for name in &peers {
            match self.resolve_peer(name, opts.file_filter.as_deref()) {
                Ok(ctx) => {
                    peer_ctx.insert(name.clone(), ctx);
                }
                Err(e) => {
                    log::warn!("{e}");
                    warnings = true;
                }
            }
        }

        let mut plans: Vec<SyncPlan> = Vec::new();
        self.plan_local_notes(&local_index, &peer_ctx, &mut plans);
        self.plan_vanished_baselines(opts, &local_index, &mut peer_ctx, &mut plans)?;
        if opts.file_filter.is_none() {
            self.plan_adoptions(&local_index, &peer_ctx, &mut plans);
        }

        if opts.dry_run {
            log::info!("dry run - planned actions:");
            for plan in plans.iter().filter(|p| p.decision != SyncDecision::NoOp) {
                log::info!("  {}", plan.describe());
            }
            return Ok((0, peers));
        }

        let mut skipped = 0usize;
        for plan in &plans {
            if plan.decision != SyncDecision::NoOp {
                log::info!("executing: {}", plan.describe());
            }
            match self.execute_plan(plan, ui) {
                Ok(PlanOutcome::Done) => {
                    // Persist between plans so an interrupted run resumes
                    // from agreed state.
                    self.syncstate.save(&self.root)?;
                }
                Ok(PlanOutcome::Noop) => {}
                Ok(PlanOutcome::ConflictSkipped) => skipped += 1,
                Err(e) => {
                    log::error!("error syncing {}: {e}", plan.describe());
                    warnings = true;
                }
            }
        }
        self.syncstate.save(&self.root)?;

        let code = if skipped > 0 {
            3
        } else if warnings {
            1
        } else {
            0
        };
        Ok((code, peers))
    }

    /// Resolve a declared peer name to an indexed vault.
    fn resolve_peer(&self, name: &str, limit: Option<&str>) -> Result<PeerCtx, CastError> {
        let entry = self
            .registry
            .resolve_by_name(name)
            .ok_or_else(|| CastError::PeerUnresolved(name.to_string()))?;
        let root = fsutil::canonicalize_lossy(&entry.root);
        let vault = entry.vault_path();
        if !vault.exists() || !fsutil::cast_dir(&root).exists() {
            return Err(CastError::PeerMissingControlDir { name: name.to_string(), root });
        }
        log::info!("indexing peer {name}: {}", vault.display());
        let mut index = EphemeralIndex::new();
        // Peer files are never modified during indexing.
        index.scan(&vault, false, limit)?;
        Ok(PeerCtx { root, vault, index })
    }

    /// First pass: one plan per (local note, declared peer).
    fn plan_local_notes(
        &self,
        local_index: &EphemeralIndex,
        peer_ctx: &BTreeMap<String, PeerCtx>,
        plans: &mut Vec<SyncPlan>,
    ) {
        for rec in local_index.records() {
            // Self-entries do not count toward the watch-only check.
            let mut others = rec
                .peers
                .iter()
                .filter(|(name, _)| **name != self.config.cast_name)
                .peekable();
            let all_watch = others.peek().is_some() && others.all(|(_, m)| !m.is_live());
            for (peer_name, mode) in &rec.peers {
                if *peer_name == self.config.cast_name {
                    continue;
                }
                let Some(ctx) = peer_ctx.get(peer_name) else { continue };
                let peer_rec = ctx.index.get_by_id(&rec.cast_id);
                let baseline = self.syncstate.baseline(&rec.cast_id, peer_name);
                let decision = decide(&DecideInput {
                    local: Some(rec),
                    peer: peer_rec,
                    baseline,
                    mode: *mode,
                    all_watch,
                });
                plans.push(SyncPlan {
                    cast_id: rec.cast_id.clone(),
                    peer_name: peer_name.clone(),
                    peer_root: ctx.root.clone(),
                    peer_vault: ctx.vault.clone(),
                    decision,
                    local_rel: Some(rec.relpath.clone()),
                    peer_rel: peer_rec.map(|p| p.relpath.clone()),
                    local_digest: Some(rec.digest.clone()),
                    peer_digest: peer_rec.map(|p| p.digest.clone()),
                    baseline_digest: baseline.map(ToString::to_string),
                });
            }
        }
    }

    /// Second pass: derive plans from baselines whose cast-id disappeared
    /// locally.
    fn plan_vanished_baselines(
        &mut self,
        opts: &SyncOptions,
        local_index: &EphemeralIndex,
        peer_ctx: &mut BTreeMap<String, PeerCtx>,
        plans: &mut Vec<SyncPlan>,
    ) -> Result<(), CastError> {
        let vanished: Vec<(String, Vec<String>)> = self
            .syncstate
            .baselines
            .iter()
            .filter(|(cast_id, _)| {
                local_index.get_by_id(cast_id).is_none()
                    && opts.file_filter.as_deref().is_none_or(|f| f == cast_id.as_str())
            })
            .map(|(cast_id, peers)| (cast_id.clone(), peers.keys().cloned().collect()))
            .collect();

        for (cast_id, peer_names) in vanished {
            for peer_name in peer_names {
                if peer_name == self.config.cast_name {
                    continue;
                }
                if !peer_ctx.contains_key(&peer_name) {
                    // The note is gone, so its declaration is too; resolve
                    // the peer on demand, scoped to this id.
                    match self.resolve_peer(&peer_name, Some(&cast_id)) {
                        Ok(ctx) => {
                            peer_ctx.insert(peer_name.clone(), ctx);
                        }
                        Err(e) => {
                            log::warn!("{e}");
                            continue;
                        }
                    }
                }
                let ctx = &peer_ctx[&peer_name];
                let baseline =
                    self.syncstate.baseline(&cast_id, &peer_name).map(String::from);
                let Some(peer_rec) = ctx.index.get_by_id(&cast_id) else {
                    // Both sides agree the note is gone.
                    log::info!("clearing baseline for vanished note {cast_id} (peer {peer_name})");
                    let our_name = self.config.cast_name.clone();
                    let peer_root = ctx.root.clone();
                    self.syncstate.clear_both(&cast_id, &peer_name, &our_name, Some(&peer_root))?;
                    continue;
                };
                // The peer's own entry in the shared declaration carries the
                // mode for this direction.
                let mode = peer_rec.peers.get(&peer_name).copied().unwrap_or(PeerMode::Live);
                let decision = decide(&DecideInput {
                    local: None,
                    peer: Some(peer_rec),
                    baseline: baseline.as_deref(),
                    mode,
                    all_watch: false,
                });
                plans.push(SyncPlan {
                    cast_id: cast_id.clone(),
                    peer_name: peer_name.clone(),
                    peer_root: ctx.root.clone(),
                    peer_vault: ctx.vault.clone(),
                    decision,
                    local_rel: None,
                    peer_rel: Some(peer_rec.relpath.clone()),
                    local_digest: None,
                    peer_digest: Some(peer_rec.digest.clone()),
                    baseline_digest: baseline,
                });
            }
        }
        Ok(())
    }

    /// Third pass: adopt peer notes that declare this vault but are unknown
    /// here and have no baseline.
    fn plan_adoptions(
        &self,
        local_index: &EphemeralIndex,
        peer_ctx: &BTreeMap<String, PeerCtx>,
        plans: &mut Vec<SyncPlan>,
    ) {
        let mut adopted: BTreeSet<String> = BTreeSet::new();
        for (peer_name, ctx) in peer_ctx {
            for peer_rec in ctx.index.records() {
                if peer_rec.cast_id.is_empty()
                    || local_index.get_by_id(&peer_rec.cast_id).is_some()
                    || !peer_rec.peers.contains_key(&self.config.cast_name)
                {
                    continue;
                }
                let baseline = self.syncstate.baseline(&peer_rec.cast_id, peer_name);
                if baseline.is_some() {
                    // Known-then-deleted pairs belong to the vanished pass.
                    continue;
                }
                if !adopted.insert(peer_rec.cast_id.clone()) {
                    continue;
                }
                let mode =
                    peer_rec.peers.get(peer_name).copied().unwrap_or(PeerMode::Live);
                let decision = decide(&DecideInput {
                    local: None,
                    peer: Some(peer_rec),
                    baseline,
                    mode,
                    all_watch: false,
                });
                plans.push(SyncPlan {
                    cast_id: peer_rec.cast_id.clone(),
                    peer_name: peer_name.clone(),
                    peer_root: ctx.root.clone(),
                    peer_vault: ctx.vault.clone(),
                    decision,
                    local_rel: None,
                    peer_rel: Some(peer_rec.relpath.clone()),
                    local_digest: None,
                    peer_digest: Some(peer_rec.digest.clone()),
                    baseline_digest: None,
                });
            }
        }
    }
}
