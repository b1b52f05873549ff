//! Candidate resolver.
//!
//! For one source, searches the known proxy locations in a fixed priority
//! order and classifies the outcome as a [`ProxyDecision`]. The first
//! matching step wins:
//!
//! 1. exact match in the proxies directory
//! 2. centralized repository
//! 3. camera twin next to the source
//! 4. camera twin already staged in the proxies directory
//! 5. proxy with a different extension (conflict)
//! 6. legacy locations
//! 7. regenerate
//!
//! Every artifact that gets relocated or renamed is claimed first; losing a
//! claim means another worker owns it and resolves to `SkipExisting`.

use crate::codec::EncodePlan;
use crate::conflict::{ConflictChoice, PendingConflict};
use crate::context::RunContext;
use crate::decision::ProxyDecision;
use crate::naming::{extension_of, is_camera_twin_stem, proxy_file_name, stem_of, PROXY_SUFFIX};
use crate::relocate::{copy_verify_delete, move_artifact, rename_in_place, RelocateError};
use crate::source::{list_videos, Pairing, SourceFile};
use std::path::{Path, PathBuf};
use tracing::{debug, debug_span, warn};

pub struct Resolver<'a> {
    ctx: &'a RunContext,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Resolve one source against the filesystem.
    ///
    /// Never returns `Transcoded`; `Regenerate` hands off to the encoder.
    pub fn resolve(&self, source: &SourceFile, plan: &EncodePlan) -> ProxyDecision {
        let span = debug_span!("resolve", source = %source.path.display());
        let _enter = span.enter();

        let expected = self.ctx.proxy_path(&source.stem, plan.output_extension);

        if let Some(decision) = self.exact_match(&expected) {
            return decision;
        }
        if let Some(decision) = self.repository_match(source, plan.output_extension) {
            return decision;
        }
        if let Some(decision) = self.camera_pair(source) {
            return decision;
        }
        if let Some(decision) = self.staged_twin(source) {
            return decision;
        }

        let duplicate_of = match self.different_extension_proxy(source, &expected) {
            Some(existing) => {
                let conflict = PendingConflict {
                    source: source.path.clone(),
                    existing,
                    expected: expected.clone(),
                };
                match self.conflict_choice(&conflict) {
                    ConflictChoice::Skip => {
                        return ProxyDecision::SkipConflict {
                            existing: conflict.existing,
                        }
                    }
                    ConflictChoice::Duplicate => Some(conflict.existing),
                }
            }
            None => None,
        };

        if let Some(decision) = self.legacy_match(source) {
            return decision;
        }

        ProxyDecision::Regenerate { duplicate_of }
    }

    /// Read-only pass over steps 1-2 followed by the duplicate check.
    ///
    /// Returns the conflict this source would hit at step 5, if any.
    pub fn pending_conflict(&self, source: &SourceFile, expected_ext: &str) -> Option<PendingConflict> {
        let expected = self.ctx.proxy_path(&source.stem, expected_ext);

        if expected.exists() && self.is_valid(&expected) {
            return None;
        }
        if self.repository_candidate(source, expected_ext).is_some() {
            return None;
        }

        let existing = self.different_extension_proxy(source, &expected)?;
        Some(PendingConflict {
            source: source.path.clone(),
            existing,
            expected,
        })
    }

    fn is_valid(&self, path: &Path) -> bool {
        self.ctx.probe.is_valid_proxy(path)
    }

    fn exact_match(&self, expected: &Path) -> Option<ProxyDecision> {
        if expected.exists() && self.is_valid(expected) {
            debug!(proxy = %expected.display(), "exact match");
            return Some(ProxyDecision::SkipExisting {
                proxy: expected.to_path_buf(),
            });
        }
        None
    }

    fn repository_candidate(&self, source: &SourceFile, expected_ext: &str) -> Option<PathBuf> {
        let repo = self.ctx.repository_dir.as_ref()?;

        let standard = repo.join(proxy_file_name(&source.stem, expected_ext));
        if standard.is_file() && self.is_valid(&standard) {
            return Some(standard);
        }

        list_videos(repo).into_iter().map(|(p, _)| p).find(|p| {
            stem_of(p).is_some_and(|s| is_camera_twin_stem(s, &source.stem)) && self.is_valid(p)
        })
    }

    fn repository_match(&self, source: &SourceFile, expected_ext: &str) -> Option<ProxyDecision> {
        let artifact = self.repository_candidate(source, expected_ext)?;
        let target = self.ctx.proxy_path(&source.stem, extension_of(&artifact)?);
        debug!(artifact = %artifact.display(), "repository candidate");

        self.claim_and_relocate(&artifact, &target, |from, to| {
            ProxyDecision::Relocated { from, to }
        })
    }

    fn camera_pair(&self, source: &SourceFile) -> Option<ProxyDecision> {
        match &source.pairing {
            Pairing::None => None,
            Pairing::IsTwinOf(original) => Some(ProxyDecision::SkipAsTwin {
                original: original.clone(),
            }),
            Pairing::HasTwin(twin) => {
                let target = self.ctx.proxy_path(&source.stem, extension_of(twin)?);
                self.claim_and_relocate(twin, &target, |twin, to| {
                    ProxyDecision::PairMoved { twin, to }
                })
            }
        }
    }

    /// Steps 2 and 3: occupied target, claim, validity, then
    /// copy-verify-delete. Relocation failures fall through.
    fn claim_and_relocate(
        &self,
        artifact: &Path,
        target: &Path,
        outcome: impl FnOnce(PathBuf, PathBuf) -> ProxyDecision,
    ) -> Option<ProxyDecision> {
        if target.exists() && self.is_valid(target) {
            return Some(ProxyDecision::SkipExisting {
                proxy: target.to_path_buf(),
            });
        }

        if !self.ctx.claims.claim(artifact) {
            debug!(artifact = %artifact.display(), "artifact claimed by another worker");
            return Some(ProxyDecision::SkipExisting {
                proxy: target.to_path_buf(),
            });
        }

        if !self.is_valid(artifact) {
            return None;
        }

        match copy_verify_delete(artifact, target) {
            Ok(()) => Some(outcome(artifact.to_path_buf(), target.to_path_buf())),
            Err(e) => {
                warn!(artifact = %artifact.display(), target = %target.display(), error = %e, "relocation failed");
                None
            }
        }
    }

    fn staged_twin(&self, source: &SourceFile) -> Option<ProxyDecision> {
        let staged = list_videos(&self.ctx.proxies_dir)
            .into_iter()
            .map(|(p, _)| p)
            .find(|p| {
                stem_of(p).is_some_and(|s| is_camera_twin_stem(s, &source.stem)) && self.is_valid(p)
            })?;

        let target = self.ctx.proxy_path(&source.stem, extension_of(&staged)?);
        if target.exists() {
            debug!(target = %target.display(), "standard name taken, not renaming staged twin");
            return None;
        }

        if !self.ctx.claims.claim(&staged) {
            return Some(ProxyDecision::SkipExisting { proxy: target });
        }

        match rename_in_place(&staged, &target) {
            Ok(()) => Some(ProxyDecision::PairRenamed {
                from: staged,
                to: target,
            }),
            Err(e) => {
                warn!(staged = %staged.display(), error = %e, "failed to rename staged twin");
                None
            }
        }
    }

    fn different_extension_proxy(&self, source: &SourceFile, expected: &Path) -> Option<PathBuf> {
        let proxy_stem = format!("{}{}", source.stem, PROXY_SUFFIX);
        let expected_ext = extension_of(expected).map(str::to_lowercase);

        list_videos(&self.ctx.proxies_dir)
            .into_iter()
            .map(|(p, _)| p)
            .find(|p| {
                p != expected
                    && stem_of(p).is_some_and(|s| s.eq_ignore_ascii_case(&proxy_stem))
                    && extension_of(p).map(str::to_lowercase) != expected_ext
                    && self.is_valid(p)
            })
    }

    fn conflict_choice(&self, conflict: &PendingConflict) -> ConflictChoice {
        if let Some(choice) = self.ctx.conflicts.get(&conflict.source) {
            return choice;
        }
        let mut resolver = self.ctx.conflict_resolver.lock();
        if self.ctx.prompt_during_run {
            resolver.decide(conflict)
        } else {
            resolver.policy_default()
        }
    }

    fn legacy_candidate(&self, source: &SourceFile) -> Option<PathBuf> {
        let parent = source.parent();
        let wanted = format!("{}{}", source.stem.to_lowercase(), PROXY_SUFFIX);

        let legacy_dir = parent.join(&self.ctx.legacy_subdir_name);
        let in_subdir = list_videos(&legacy_dir).into_iter().map(|(p, _)| p).find(|p| {
            stem_of(p).is_some_and(|s| s.to_lowercase() == wanted) && self.is_valid(p)
        });
        if in_subdir.is_some() {
            return in_subdir;
        }

        let base = source.stem.to_lowercase();
        list_videos(parent).into_iter().map(|(p, _)| p).find(|p| {
            p != &source.path
                && stem_of(p).is_some_and(|s| {
                    let lower = s.to_lowercase();
                    lower.contains(PROXY_SUFFIX) && lower.contains(&base)
                })
                && self.is_valid(p)
        })
    }

    fn legacy_match(&self, source: &SourceFile) -> Option<ProxyDecision> {
        let candidate = self.legacy_candidate(source)?;
        let target = self.ctx.proxy_path(&source.stem, extension_of(&candidate)?);

        if target.exists() {
            return Some(collision(&target));
        }
        if !self.ctx.claims.claim(&candidate) {
            return Some(ProxyDecision::SkipExisting { proxy: target });
        }

        match move_artifact(&candidate, &target) {
            Ok(()) => Some(ProxyDecision::LegacyMoved {
                from: candidate,
                to: target,
            }),
            Err(RelocateError::DestinationExists(_)) => Some(collision(&target)),
            Err(e) => {
                warn!(candidate = %candidate.display(), error = %e, "failed to move legacy proxy");
                None
            }
        }
    }
}

fn collision(target: &Path) -> ProxyDecision {
    ProxyDecision::error(format!("Name collision detected at {}", target.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Accelerator;
    use crate::conflict::{ConflictResolver, PromptAnswer};
    use crate::config::Config;
    use crate::test_support::{write_file, FakeProbe, FakeTranscoder};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        ctx: RunContext,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(Config::default())
        }

        fn with_config(config: Config) -> Self {
            let tmp = TempDir::new().unwrap();
            let ctx = RunContext::new(
                &config,
                tmp.path().join("proxies"),
                Accelerator::Software,
                Arc::new(FakeProbe::default()),
                Arc::new(FakeTranscoder::default()),
            );
            Self { tmp, ctx }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.tmp.path().join(rel)
        }

        fn source(&self, rel: &str) -> SourceFile {
            SourceFile::describe(&self.path(rel), self.ctx.probe.as_ref()).unwrap()
        }

        fn resolve(&self, rel: &str) -> ProxyDecision {
            let source = self.source(rel);
            let plan = self.ctx.plan_for(&source);
            Resolver::new(&self.ctx).resolve(&source, &plan)
        }
    }

    #[test]
    fn test_exact_match_skips() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("proxies/a_proxy.mov"), b"VIDEO proxy");

        assert_eq!(
            fx.resolve("day1/a.mov"),
            ProxyDecision::SkipExisting {
                proxy: fx.path("proxies/a_proxy.mov")
            }
        );
    }

    #[test]
    fn test_invalid_exact_match_regenerates() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("proxies/a_proxy.mov"), b"truncated");

        assert_eq!(
            fx.resolve("day1/a.mov"),
            ProxyDecision::Regenerate { duplicate_of: None }
        );
    }

    #[test]
    fn test_repository_relocation() {
        let fx = repository_fixture();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("repo/a_proxy.mov"), b"VIDEO repo proxy");

        assert_eq!(
            fx.resolve("day1/a.mov"),
            ProxyDecision::Relocated {
                from: fx.path("repo/a_proxy.mov"),
                to: fx.path("proxies/a_proxy.mov"),
            }
        );
        assert!(!fx.path("repo/a_proxy.mov").exists());
        assert_eq!(fs::read(fx.path("proxies/a_proxy.mov")).unwrap(), b"VIDEO repo proxy");
    }

    fn repository_fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.locations.repository_dir = Some(tmp.path().join("repo"));
        let ctx = RunContext::new(
            &config,
            tmp.path().join("proxies"),
            Accelerator::Software,
            Arc::new(FakeProbe::default()),
            Arc::new(FakeTranscoder::default()),
        );
        Fixture { tmp, ctx }
    }

    #[test]
    fn test_repository_camera_twin_keeps_extension() {
        let fx = repository_fixture();
        write_file(&fx.path("day1/C0001.MP4"), b"VIDEO full size original");
        write_file(&fx.path("repo/C0001S03.MP4"), b"VIDEO twin");

        assert_eq!(
            fx.resolve("day1/C0001.MP4"),
            ProxyDecision::Relocated {
                from: fx.path("repo/C0001S03.MP4"),
                to: fx.path("proxies/C0001_proxy.MP4"),
            }
        );
    }

    #[test]
    fn test_repository_target_occupied() {
        let fx = repository_fixture();
        write_file(&fx.path("day1/C0001.MP4"), b"VIDEO full size original");
        write_file(&fx.path("repo/C0001S03.MP4"), b"VIDEO twin");
        write_file(&fx.path("proxies/C0001_proxy.MP4"), b"VIDEO already here");

        assert_eq!(
            fx.resolve("day1/C0001.MP4"),
            ProxyDecision::SkipExisting {
                proxy: fx.path("proxies/C0001_proxy.MP4")
            }
        );
        assert!(fx.path("repo/C0001S03.MP4").exists());
    }

    #[test]
    fn test_camera_pair_moves_twin_and_skips_twin_source() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/C0001.MP4"), b"VIDEO full size original");
        write_file(&fx.path("day1/C0001S03.MP4"), b"VIDEO twin");

        let twin_source = fx.source("day1/C0001S03.MP4");
        let original = fx.resolve("day1/C0001.MP4");

        assert_eq!(
            original,
            ProxyDecision::PairMoved {
                twin: fx.path("day1/C0001S03.MP4"),
                to: fx.path("proxies/C0001_proxy.MP4"),
            }
        );
        assert!(!fx.path("day1/C0001S03.MP4").exists());

        let plan = fx.ctx.plan_for(&twin_source);
        assert_eq!(
            Resolver::new(&fx.ctx).resolve(&twin_source, &plan),
            ProxyDecision::SkipAsTwin {
                original: fx.path("day1/C0001.MP4")
            }
        );
    }

    #[test]
    fn test_retry_after_copy_before_delete_skips() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/C0001.MP4"), b"VIDEO full size original");
        write_file(&fx.path("day1/C0001S03.MP4"), b"VIDEO twin");
        write_file(&fx.path("proxies/C0001_proxy.MP4"), b"VIDEO twin");
        let before = fs::metadata(fx.path("proxies/C0001_proxy.MP4")).unwrap().modified().unwrap();

        assert_eq!(
            fx.resolve("day1/C0001.MP4"),
            ProxyDecision::SkipExisting {
                proxy: fx.path("proxies/C0001_proxy.MP4")
            }
        );
        let after = fs::metadata(fx.path("proxies/C0001_proxy.MP4")).unwrap().modified().unwrap();
        assert_eq!(before, after);
        assert!(fx.path("day1/C0001S03.MP4").exists());
    }

    #[test]
    fn test_concurrent_pair_resolution_moves_once() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/C0001.MP4"), b"VIDEO full size original");
        write_file(&fx.path("day1/C0001S03.MP4"), b"VIDEO twin");

        let source = fx.source("day1/C0001.MP4");
        let plan = fx.ctx.plan_for(&source);

        let decisions: Vec<ProxyDecision> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| Resolver::new(&fx.ctx).resolve(&source, &plan)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let moved = decisions
            .iter()
            .filter(|d| matches!(d, ProxyDecision::PairMoved { .. }))
            .count();
        assert_eq!(moved, 1);
        for d in decisions.iter().filter(|d| !matches!(d, ProxyDecision::PairMoved { .. })) {
            assert_eq!(
                d,
                &ProxyDecision::SkipExisting {
                    proxy: fx.path("proxies/C0001_proxy.MP4")
                }
            );
        }
    }

    #[test]
    fn test_staged_twin_is_renamed() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/C0002.MP4"), b"VIDEO original");
        write_file(&fx.path("proxies/C0002S03.MP4"), b"VIDEO staged");

        assert_eq!(
            fx.resolve("day1/C0002.MP4"),
            ProxyDecision::PairRenamed {
                from: fx.path("proxies/C0002S03.MP4"),
                to: fx.path("proxies/C0002_proxy.MP4"),
            }
        );
    }

    #[test]
    fn test_staged_twin_with_taken_name_falls_through() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/C0002.MP4"), b"VIDEO original");
        write_file(&fx.path("proxies/C0002S03.MP4"), b"VIDEO staged");
        write_file(&fx.path("proxies/C0002_proxy.MP4"), b"VIDEO other");

        // The existing .MP4 proxy then shows up as a different-extension duplicate.
        assert_eq!(
            fx.resolve("day1/C0002.MP4"),
            ProxyDecision::Regenerate {
                duplicate_of: Some(fx.path("proxies/C0002_proxy.MP4"))
            }
        );
        assert!(fx.path("proxies/C0002S03.MP4").exists());
    }

    #[test]
    fn test_different_extension_policy_default_duplicates() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("proxies/a_proxy.mp4"), b"VIDEO h264 proxy");

        assert_eq!(
            fx.resolve("day1/a.mov"),
            ProxyDecision::Regenerate {
                duplicate_of: Some(fx.path("proxies/a_proxy.mp4"))
            }
        );
    }

    #[test]
    fn test_different_extension_stem_ignores_case() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/Clip.mov"), b"VIDEO source");
        write_file(&fx.path("proxies/clip_proxy.mp4"), b"VIDEO h264 proxy");

        let source = fx.source("day1/Clip.mov");
        let pending = Resolver::new(&fx.ctx).pending_conflict(&source, "mov");
        assert_eq!(
            pending.map(|c| c.existing),
            Some(fx.path("proxies/clip_proxy.mp4"))
        );
        assert_eq!(
            fx.resolve("day1/Clip.mov"),
            ProxyDecision::Regenerate {
                duplicate_of: Some(fx.path("proxies/clip_proxy.mp4"))
            }
        );
    }

    #[test]
    fn test_different_extension_auto_skip() {
        let mut config = Config::default();
        config.conflicts.auto_skip_duplicates = true;
        let fx = Fixture::with_config(config);
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("proxies/a_proxy.mp4"), b"VIDEO h264 proxy");

        assert_eq!(
            fx.resolve("day1/a.mov"),
            ProxyDecision::SkipConflict {
                existing: fx.path("proxies/a_proxy.mp4")
            }
        );
    }

    #[test]
    fn test_pre_resolved_conflict_is_binding() {
        let mut fx = Fixture::new();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("proxies/a_proxy.mp4"), b"VIDEO h264 proxy");

        let source = fx.source("day1/a.mov");
        let plan = fx.ctx.plan_for(&source);
        let pending = Resolver::new(&fx.ctx)
            .pending_conflict(&source, plan.output_extension)
            .expect("conflict detected");
        assert_eq!(pending.existing, fx.path("proxies/a_proxy.mp4"));
        assert_eq!(pending.expected, fx.path("proxies/a_proxy.mov"));

        fx.ctx
            .conflicts
            .insert(source.path.clone(), ConflictChoice::Skip);
        assert_eq!(
            Resolver::new(&fx.ctx).resolve(&source, &plan),
            ProxyDecision::SkipConflict {
                existing: fx.path("proxies/a_proxy.mp4")
            }
        );
    }

    #[test]
    fn test_pending_conflict_absent_when_exact_match_exists() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("proxies/a_proxy.mov"), b"VIDEO proxy");
        write_file(&fx.path("proxies/a_proxy.mp4"), b"VIDEO other");

        let source = fx.source("day1/a.mov");
        assert!(Resolver::new(&fx.ctx).pending_conflict(&source, "mov").is_none());
    }

    #[test]
    fn test_interactive_prompt_during_sequential_run() {
        struct AlwaysSkip;
        impl crate::conflict::ConflictPrompter for AlwaysSkip {
            fn ask(&mut self, _c: &PendingConflict) -> Option<PromptAnswer> {
                Some(PromptAnswer::Skip)
            }
        }

        let mut fx = Fixture::new();
        fx.ctx = fx
            .ctx
            .with_conflict_resolver(ConflictResolver::interactive(false, Box::new(AlwaysSkip)), true);
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("proxies/a_proxy.mp4"), b"VIDEO h264 proxy");

        assert!(matches!(
            fx.resolve("day1/a.mov"),
            ProxyDecision::SkipConflict { .. }
        ));
    }

    #[test]
    fn test_skip_all_applies_to_conflicts_found_later() {
        let mut fx = Fixture::new();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("day1/b.mov"), b"VIDEO source");
        write_file(&fx.path("proxies/a_proxy.mp4"), b"VIDEO h264 proxy");

        let mut resolver =
            ConflictResolver::interactive(false, Box::new(Answers(vec![PromptAnswer::SkipAll])));
        let source = fx.source("day1/a.mov");
        let pending = Resolver::new(&fx.ctx).pending_conflict(&source, "mov").unwrap();
        fx.ctx.conflicts = resolver.resolve_all(&[pending]);
        fx.ctx = fx.ctx.with_conflict_resolver(resolver, false);

        // Written after pre-resolution ran.
        write_file(&fx.path("proxies/b_proxy.mp4"), b"VIDEO h264 proxy");

        assert_eq!(
            fx.resolve("day1/b.mov"),
            ProxyDecision::SkipConflict {
                existing: fx.path("proxies/b_proxy.mp4")
            }
        );
    }

    struct Answers(Vec<PromptAnswer>);

    impl crate::conflict::ConflictPrompter for Answers {
        fn ask(&mut self, _c: &PendingConflict) -> Option<PromptAnswer> {
            if self.0.is_empty() {
                None
            } else {
                Some(self.0.remove(0))
            }
        }
    }

    #[test]
    fn test_legacy_subfolder_moved() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("day1/Proxies/A_Proxy.mov"), b"VIDEO legacy");

        assert_eq!(
            fx.resolve("day1/a.mov"),
            ProxyDecision::LegacyMoved {
                from: fx.path("day1/Proxies/A_Proxy.mov"),
                to: fx.path("proxies/a_proxy.mov"),
            }
        );
    }

    #[test]
    fn test_legacy_same_directory_moved() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/clip.mov"), b"VIDEO source");
        write_file(&fx.path("day1/clip_proxy_old.mp4"), b"VIDEO legacy");

        assert_eq!(
            fx.resolve("day1/clip.mov"),
            ProxyDecision::LegacyMoved {
                from: fx.path("day1/clip_proxy_old.mp4"),
                to: fx.path("proxies/clip_proxy.mp4"),
            }
        );
    }

    #[test]
    fn test_legacy_collision_is_error() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        write_file(&fx.path("day1/Proxies/a_proxy.mov"), b"VIDEO legacy");
        write_file(&fx.path("proxies/a_proxy.mov"), b"corrupt");

        let decision = fx.resolve("day1/a.mov");
        assert!(matches!(
            &decision,
            ProxyDecision::Error { reason } if reason.contains("collision")
        ));
        assert!(fx.path("day1/Proxies/a_proxy.mov").exists());
        assert_eq!(fs::read(fx.path("proxies/a_proxy.mov")).unwrap(), b"corrupt");
    }

    #[test]
    fn test_no_candidate_regenerates() {
        let fx = Fixture::new();
        write_file(&fx.path("day1/a.mov"), b"VIDEO source");
        assert_eq!(
            fx.resolve("day1/a.mov"),
            ProxyDecision::Regenerate { duplicate_of: None }
        );
    }
}
