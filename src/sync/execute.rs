//! Plan execution: copy, delete, and id-aware rename with collision
//! avoidance, plus symmetric baseline updates and event emission.

use std::fs;
use std::path::{Path, PathBuf};

use super::plan::SyncPlan;
use super::{HorizontalSync, PlanOutcome, SyncDecision};
use crate::conflict::{self, ConflictResolution, ConflictUi};
use crate::errors::CastError;
use crate::events::{self, Event};
use crate::fsutil;
use crate::rename::{RenameSpec, RewriteOptions, update_links_for_renames};
use crate::yamlio;

impl HorizontalSync {
    pub(super) fn execute_plan(
        &mut self,
        plan: &SyncPlan,
        ui: &mut dyn ConflictUi,
    ) -> Result<PlanOutcome, CastError> {
        match plan.decision {
            SyncDecision::NoOp => self.execute_noop(plan),
            SyncDecision::Pull => self.execute_pull(plan),
            SyncDecision::Push | SyncDecision::CreatePeer => self.execute_push(plan),
            SyncDecision::CreateLocal => self.execute_create_local(plan),
            SyncDecision::DeleteLocal => self.execute_delete_local(plan),
            SyncDecision::DeletePeer => self.execute_delete_peer(plan),
            SyncDecision::RenamePeer => self.execute_rename_peer(plan),
            SyncDecision::RenameLocal => self.execute_rename_local(plan),
            SyncDecision::Conflict => self.execute_conflict(plan, ui),
        }
    }

    /// Identical content on both sides with no (or a stale) baseline: record
    /// the agreed digest even though there is nothing to copy.
    fn execute_noop(&mut self, plan: &SyncPlan) -> Result<PlanOutcome, CastError> {
        if plan.peer_digest.is_some()
            && plan.local_digest == plan.peer_digest
            && plan.baseline_digest != plan.local_digest
        {
            self.update_baseline_both(plan, plan.local_digest.as_deref().unwrap_or_default())?;
            return Ok(PlanOutcome::Done);
        }
        Ok(PlanOutcome::Noop)
    }

    fn execute_pull(&mut self, plan: &SyncPlan) -> Result<PlanOutcome, CastError> {
        let (Some(local_rel), Some(peer_rel)) = (&plan.local_rel, &plan.peer_rel) else {
            return Ok(PlanOutcome::Noop);
        };
        let from = plan.peer_vault.join(peer_rel);
        let to = self.vault_path.join(local_rel);
        copy_note(&from, &to)?;
        self.update_baseline_both(plan, plan.peer_digest.as_deref().unwrap_or_default())?;
        self.emit(plan, Event::new("pull", &plan.cast_id, &plan.peer_name).with_path(local_rel));
        Ok(PlanOutcome::Done)
    }

    /// Push and create-peer both copy local content to the peer, never over
    /// a foreign cast-id.
    fn execute_push(&mut self, plan: &SyncPlan) -> Result<PlanOutcome, CastError> {
        let Some(local_rel) = &plan.local_rel else {
            return Ok(PlanOutcome::Noop);
        };
        let dest_rel = plan.peer_rel.as_deref().unwrap_or(local_rel);
        let from = self.vault_path.join(local_rel);
        let dest = self.divert_foreign_id(&plan.peer_vault.join(dest_rel), &plan.cast_id);
        copy_note(&from, &dest)?;
        self.update_baseline_both(plan, plan.local_digest.as_deref().unwrap_or_default())?;
        let dest_rel = rel_in(&plan.peer_vault, &dest);
        self.emit(
            plan,
            Event::new(plan.decision.as_str(), &plan.cast_id, &plan.peer_name)
                .with_path(&dest_rel),
        );
        Ok(PlanOutcome::Done)
    }

    /// Adopt a peer note unknown to this vault, at the peer's relpath.
    fn execute_create_local(&mut self, plan: &SyncPlan) -> Result<PlanOutcome, CastError> {
        let Some(peer_rel) = &plan.peer_rel else {
            return Ok(PlanOutcome::Noop);
        };
        let from = plan.peer_vault.join(peer_rel);
        let dest = self.divert_foreign_id(&self.vault_path.join(peer_rel), &plan.cast_id);
        copy_note(&from, &dest)?;
        self.update_baseline_both(plan, plan.peer_digest.as_deref().unwrap_or_default())?;
        let dest_rel = rel_in(&self.vault_path, &dest);
        self.emit(
            plan,
            Event::new("create_local", &plan.cast_id, &plan.peer_name).with_path(&dest_rel),
        );
        Ok(PlanOutcome::Done)
    }

    fn execute_delete_local(&mut self, plan: &SyncPlan) -> Result<PlanOutcome, CastError> {
        if let Some(local_rel) = &plan.local_rel {
            remove_note(&self.vault_path.join(local_rel))?;
            self.clear_baseline_both(plan)?;
            self.emit(
                plan,
                Event::new("delete_local", &plan.cast_id, &plan.peer_name).with_path(local_rel),
            );
        }
        Ok(PlanOutcome::Done)
    }

    fn execute_delete_peer(&mut self, plan: &SyncPlan) -> Result<PlanOutcome, CastError> {
        if let Some(peer_rel) = &plan.peer_rel {
            remove_note(&plan.peer_vault.join(peer_rel))?;
            self.clear_baseline_both(plan)?;
            self.emit(
                plan,
                Event::new("delete_peer", &plan.cast_id, &plan.peer_name).with_path(peer_rel),
            );
        }
        Ok(PlanOutcome::Done)
    }

    /// Move the peer's copy to the local relpath, then repair links inside
    /// the peer vault before the next plan runs.
    fn execute_rename_peer(&mut self, plan: &SyncPlan) -> Result<PlanOutcome, CastError> {
        let (Some(local_rel), Some(peer_rel)) = (&plan.local_rel, &plan.peer_rel) else {
            return Ok(PlanOutcome::Noop);
        };
        let from = plan.peer_vault.join(peer_rel);
        let to = plan.peer_vault.join(local_rel);
        let moved = move_note(&from, &to, &plan.cast_id, &self.config.cast_name)?;
        if moved {
            self.rewrite_links(&plan.peer_vault, peer_rel, local_rel);
        }
        self.update_baseline_both(plan, plan.local_digest.as_deref().unwrap_or_default())?;
        self.emit(
            plan,
            Event::new("rename_peer", &plan.cast_id, &plan.peer_name)
                .with_move(peer_rel, local_rel),
        );
        Ok(PlanOutcome::Done)
    }

    /// Adopt the peer's relpath locally; used when every declared peer is
    /// watch-only.
    fn execute_rename_local(&mut self, plan: &SyncPlan) -> Result<PlanOutcome, CastError> {
        let (Some(local_rel), Some(peer_rel)) = (&plan.local_rel, &plan.peer_rel) else {
            return Ok(PlanOutcome::Noop);
        };
        let from = self.vault_path.join(local_rel);
        let to = self.vault_path.join(peer_rel);
        let moved = move_note(&from, &to, &plan.cast_id, &self.config.cast_name)?;
        if moved {
            let vault = self.vault_path.clone();
            self.rewrite_links(&vault, local_rel, peer_rel);
        }
        self.update_baseline_both(plan, plan.local_digest.as_deref().unwrap_or_default())?;
        self.emit(
            plan,
            Event::new("rename_local", &plan.cast_id, &plan.peer_name)
                .with_move(local_rel, peer_rel),
        );
        Ok(PlanOutcome::Done)
    }

    fn execute_conflict(
        &mut self,
        plan: &SyncPlan,
        ui: &mut dyn ConflictUi,
    ) -> Result<PlanOutcome, CastError> {
        let local_path = self
            .vault_path
            .join(plan.local_rel.as_deref().or(plan.peer_rel.as_deref()).unwrap_or_default());
        let peer_path = plan.peer_rel.as_ref().map(|rel| plan.peer_vault.join(rel));

        // Deletion previews are explicit empty strings, not missing files.
        let local_missing = plan.local_rel.is_none() || !local_path.exists();
        let peer_missing = peer_path.as_deref().is_none_or(|p| !p.exists());
        let local_content = local_missing.then_some("");
        let peer_content = peer_missing.then_some("");

        let resolution = conflict::handle_conflict(
            &local_path,
            peer_path.as_deref(),
            &plan.cast_id,
            &plan.peer_name,
            &self.root,
            local_content,
            peer_content,
            ui,
        )?;

        match resolution {
            ConflictResolution::KeepLocal => {
                if local_missing {
                    if let Some(peer_path) = &peer_path {
                        remove_note(peer_path)?;
                    }
                    self.clear_baseline_both(plan)?;
                } else {
                    let dest_rel =
                        plan.peer_rel.as_deref().or(plan.local_rel.as_deref()).unwrap_or_default();
                    copy_note(&local_path, &plan.peer_vault.join(dest_rel))?;
                    self.update_baseline_both(
                        plan,
                        plan.local_digest.as_deref().unwrap_or_default(),
                    )?;
                }
                self.emit(
                    plan,
                    Event::new("conflict_keep_local", &plan.cast_id, &plan.peer_name),
                );
                Ok(PlanOutcome::Done)
            }
            ConflictResolution::KeepPeer => {
                if peer_missing {
                    if !local_missing {
                        remove_note(&local_path)?;
                    }
                    self.clear_baseline_both(plan)?;
                } else {
                    // Copy at the peer's relpath, adopting any rename.
                    let peer_rel = plan.peer_rel.as_deref().unwrap_or_default();
                    let peer_file = plan.peer_vault.join(peer_rel);
                    copy_note(&peer_file, &self.vault_path.join(peer_rel))?;
                    if let Some(local_rel) = plan.local_rel.as_deref() {
                        if local_rel != peer_rel {
                            remove_note(&self.vault_path.join(local_rel))?;
                            let vault = self.vault_path.clone();
                            self.rewrite_links(&vault, local_rel, peer_rel);
                        }
                    }
                    self.update_baseline_both(
                        plan,
                        plan.peer_digest.as_deref().unwrap_or_default(),
                    )?;
                }
                self.emit(
                    plan,
                    Event::new("conflict_keep_peer", &plan.cast_id, &plan.peer_name),
                );
                Ok(PlanOutcome::Done)
            }
            ConflictResolution::Skip => {
                self.emit(plan, Event::new("conflict_skip", &plan.cast_id, &plan.peer_name));
                Ok(PlanOutcome::ConflictSkipped)
            }
        }
    }

    fn update_baseline_both(&mut self, plan: &SyncPlan, digest: &str) -> Result<(), CastError> {
        let our_name = self.config.cast_name.clone();
        self.syncstate.update_both(
            &plan.cast_id,
            &plan.peer_name,
            digest,
            &our_name,
            Some(&plan.peer_root),
        )
    }

    fn clear_baseline_both(&mut self, plan: &SyncPlan) -> Result<(), CastError> {
        let our_name = self.config.cast_name.clone();
        self.syncstate.clear_both(
            &plan.cast_id,
            &plan.peer_name,
            &our_name,
            Some(&plan.peer_root),
        )
    }

    /// Scoped link rewrite after a rename, so downstream plans see coherent
    /// paths. Link failures degrade to warnings.
    fn rewrite_links(&self, vault: &Path, old_rel: &str, new_rel: &str) {
        let specs = [RenameSpec::new(old_rel, new_rel)];
        match update_links_for_renames(vault, &specs, &RewriteOptions::default()) {
            Ok(report) if report.total_replacements > 0 => {
                log::info!(
                    "rewrote {} link(s) in {} file(s) under {}",
                    report.total_replacements,
                    report.files_changed,
                    vault.display()
                );
            }
            Ok(_) => {}
            Err(e) => log::warn!("link rewrite failed under {}: {e}", vault.display()),
        }
    }

    /// Pick a destination that never overwrites a foreign cast-id: a
    /// suffixed `" (~from <name>)"` variant, counting up on further
    /// collisions.
    fn divert_foreign_id(&self, dest: &Path, cast_id: &str) -> PathBuf {
        if !dest.exists() || existing_cast_id(dest).as_deref() == Some(cast_id) {
            return dest.to_path_buf();
        }
        let stem = dest.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned());
        let ext = dest
            .extension()
            .map_or_else(String::new, |e| format!(".{}", e.to_string_lossy()));
        let suffix = format!(" (~from {})", self.config.cast_name);
        let mut candidate = dest.with_file_name(format!("{stem}{suffix}{ext}"));
        let mut i = 2;
        while candidate.exists() && existing_cast_id(&candidate).as_deref() != Some(cast_id) {
            candidate = dest.with_file_name(format!("{stem}{suffix} {i}{ext}"));
            i += 1;
        }
        candidate
    }

    fn emit(&self, plan: &SyncPlan, event: Event) {
        if let Err(e) = events::record(&self.root, &event) {
            log::warn!("failed to record event for {}: {e}", plan.cast_id);
        }
    }
}

/// cast-id of the note at `path`, when it parses and has one.
fn existing_cast_id(path: &Path) -> Option<String> {
    let note = yamlio::read_note(path).ok()?;
    let header = note.header?;
    yamlio::get_str(&header, "cast-id").map(ToString::to_string)
}

/// Copy via temp-then-rename so the destination is never half-written.
fn copy_note(from: &Path, to: &Path) -> Result<(), CastError> {
    let content = fs::read_to_string(from)
        .map_err(|e| CastError::ExecuteIo { path: from.to_path_buf(), source: e })?;
    fsutil::atomic_write(to, &content)
        .map_err(|e| CastError::ExecuteIo { path: to.to_path_buf(), source: e })
}

/// Delete tolerant of already-missing targets.
fn remove_note(path: &Path) -> Result<(), CastError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CastError::ExecuteIo { path: path.to_path_buf(), source: e }),
    }
}

/// Same-vault move. A pre-existing destination with the same cast-id wins
/// and the source is dropped (idempotence); a foreign id diverts to a
/// suffixed destination. Returns whether the destination path now holds the
/// note at `to` (i.e. links should be rewritten).
fn move_note(from: &Path, to: &Path, cast_id: &str, our_name: &str) -> Result<bool, CastError> {
    if !from.exists() {
        return Ok(to.exists());
    }
    if to.exists() {
        if existing_cast_id(to).as_deref() == Some(cast_id) {
            remove_note(from)?;
            return Ok(true);
        }
        let stem = to.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned());
        let ext =
            to.extension().map_or_else(String::new, |e| format!(".{}", e.to_string_lossy()));
        let suffix = format!(" (~from {our_name})");
        let mut candidate = to.with_file_name(format!("{stem}{suffix}{ext}"));
        let mut i = 2;
        while candidate.exists() {
            candidate = to.with_file_name(format!("{stem}{suffix} {i}{ext}"));
            i += 1;
        }
        rename_with_parents(from, &candidate)?;
        return Ok(false);
    }
    rename_with_parents(from, to)?;
    Ok(true)
}

fn rename_with_parents(from: &Path, to: &Path) -> Result<(), CastError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CastError::ExecuteIo { path: to.to_path_buf(), source: e })?;
    }
    fs::rename(from, to)
        .map_err(|e| CastError::ExecuteIo { path: to.to_path_buf(), source: e })
}

fn rel_in(vault: &Path, path: &Path) -> String {
    fsutil::to_posix(&path.strip_prefix(vault).unwrap_or(path).to_string_lossy())
}
