//! Multi-changeset runs: retry after interruption, resume, stop, setup.

mod common;

use std::cell::Cell;

use common::{Call, FakeTarget, ROOT, changeset, file, folder, push_with_content, read, seed, tree};
use histport::model::{ChangeFlags, ChangesetId};
use histport::progress::ReplayEvent;
use histport::replay::{RenamePlan, ReplicationOptions, Replicator};
use histport::source::MemorySource;
use histport::users::UsernameMap;

const ADD: ChangeFlags = ChangeFlags::ADD.union(ChangeFlags::EDIT);

fn options_from(id: u32) -> ReplicationOptions {
    ReplicationOptions {
        from: ChangesetId::new(id),
        ..ReplicationOptions::default()
    }
}

fn three_adds() -> MemorySource {
    let mut source = MemorySource::new();
    for (id, name) in [(1, "one.txt"), (2, "two.txt"), (3, "three.txt")] {
        push_with_content(
            &mut source,
            changeset(id, name, vec![(file(name, u64::from(id), id), ADD)]),
        );
    }
    source
}

#[test]
fn rerun_after_partial_folder_rename_is_tolerated() {
    // An earlier run renamed alpha -> beta but died before committing.
    let target = FakeTarget::new();
    let wc = target.working_copy_path();
    seed(&wc, "beta/f.txt", "f");

    let mut source = MemorySource::new();
    source.add_baseline(folder("alpha", 1, 0));
    source.add_baseline(file("alpha/f.txt", 2, 0));
    source.push(changeset(
        20,
        "retry",
        vec![
            (folder("beta", 1, 20), ChangeFlags::RENAME),
            (file("beta/g.txt", 2, 20), ChangeFlags::RENAME),
        ],
    ));

    let replicator = Replicator::new(
        &source,
        &target,
        ROOT,
        UsernameMap::new(),
        ReplicationOptions::default(),
    );
    let mut tolerated = Vec::new();
    let summary = replicator
        .run(&mut |e: &ReplayEvent| {
            if let ReplayEvent::ToleratedConflict { plan, .. } = e {
                tolerated.push(*plan);
            }
        })
        .unwrap();

    assert_eq!(summary.replayed, 1);
    assert_eq!(tolerated, vec![RenamePlan::AssumeApplied]);
    assert!(
        target
            .calls()
            .contains(&Call::Move("beta/f.txt".into(), "beta/g.txt".into()))
    );
    assert_eq!(tree(&wc), vec!["beta/g.txt"]);
    assert_eq!(target.commit_messages(), vec!["[Source Changeset #20]\nretry"]);
}

#[test]
fn failed_run_reports_resume_point_and_resumes_from_it() {
    let target = FakeTarget::new();
    let wc = target.working_copy_path();

    let mut source = three_adds();
    // Changeset 2 is broken: an edit on a folder.
    source.push(changeset(2, "bad", vec![(folder("two", 9, 2), ChangeFlags::EDIT)]));

    {
        let replicator =
            Replicator::new(&source, &target, ROOT, UsernameMap::new(), options_from(1));
        let err = replicator.run(&mut |_: &ReplayEvent| {}).unwrap_err();
        assert_eq!(err.resume_from, Some(ChangesetId::new(2)));
        assert_eq!(err.replayed, 1);
        assert!(err.to_string().contains("histport run --from 2"), "{err}");
    }
    assert_eq!(target.commit_messages().len(), 1);

    // The export is fixed and the run resumes at the failed changeset.
    push_with_content(
        &mut source,
        changeset(2, "two.txt", vec![(file("two.txt", 2, 2), ADD)]),
    );
    let replicator = Replicator::new(&source, &target, ROOT, UsernameMap::new(), options_from(2));
    let summary = replicator.run(&mut |_: &ReplayEvent| {}).unwrap();

    assert_eq!(summary.replayed, 2);
    assert_eq!(summary.last_committed, Some(ChangesetId::new(3)));
    assert_eq!(
        target.commit_messages(),
        vec![
            "[Source Changeset #1]\none.txt",
            "[Source Changeset #2]\ntwo.txt",
            "[Source Changeset #3]\nthree.txt",
        ]
    );
    assert_eq!(tree(&wc), vec!["one.txt", "three.txt", "two.txt"]);
    assert_eq!(read(&wc, "two.txt"), format!("{ROOT}/two.txt@2"));
}

#[test]
fn stop_takes_effect_between_changesets() {
    let target = FakeTarget::new();
    let source = three_adds();
    let replicator = Replicator::new(&source, &target, ROOT, UsernameMap::new(), options_from(1));
    let stop = replicator.stop_handle();

    let mut events = Vec::new();
    let summary = replicator
        .run(&mut |e: &ReplayEvent| {
            if matches!(e, ReplayEvent::ChangesetCommitted { .. }) {
                stop.stop();
            }
            events.push(e.clone());
        })
        .unwrap();

    assert!(summary.stopped);
    assert_eq!(summary.replayed, 1);
    assert_eq!(summary.last_committed, Some(ChangesetId::new(1)));
    assert_eq!(target.commit_messages().len(), 1);
    assert_eq!(
        events.last(),
        Some(&ReplayEvent::RunFinished {
            replayed: 1,
            stopped: true
        })
    );
}

#[test]
fn run_starts_at_requested_changeset() {
    let target = FakeTarget::new();
    let source = three_adds();
    let replicator = Replicator::new(&source, &target, ROOT, UsernameMap::new(), options_from(3));

    let found = Cell::new(None);
    replicator
        .run(&mut |e: &ReplayEvent| {
            if let ReplayEvent::ChangesetsFound { count } = e {
                found.set(Some(*count));
            }
        })
        .unwrap();

    assert_eq!(found.get(), Some(1));
    assert_eq!(target.commit_messages(), vec!["[Source Changeset #3]\nthree.txt"]);
}

#[test]
fn fresh_repository_and_checkout_precede_replay() {
    let target = FakeTarget::new();
    let wc = target.working_copy_path();
    seed(&wc, "junk.txt", "left over from last time");
    let repo = target.scratch().join("repo");

    let source = three_adds();
    let options = ReplicationOptions {
        create_repository: Some(repo.clone()),
        initial_checkout: true,
        ..options_from(1)
    };
    let replicator = Replicator::new(&source, &target, ROOT, UsernameMap::new(), options);
    replicator.run(&mut |_: &ReplayEvent| {}).unwrap();

    let calls = target.calls();
    assert_eq!(calls[0], Call::CreateRepository(repo.clone()));
    assert_eq!(calls[1], Call::Checkout);
    assert!(repo.is_dir());
    assert_eq!(tree(&wc), vec!["one.txt", "three.txt", "two.txt"]);
}

#[test]
fn empty_commit_skips_metadata_rewrite() {
    let target = FakeTarget::new();
    let mut source = MemorySource::new();
    source.push(changeset(5, "noop", vec![]));
    target.commit_nothing_next();

    let replicator = Replicator::new(&source, &target, ROOT, UsernameMap::new(), options_from(1));
    let mut committed = Vec::new();
    let summary = replicator
        .run(&mut |e: &ReplayEvent| {
            if let ReplayEvent::ChangesetCommitted { revision, .. } = e {
                committed.push(*revision);
            }
        })
        .unwrap();

    assert_eq!(committed, vec![None]);
    assert_eq!(summary.replayed, 1);
    assert_eq!(summary.last_revision, None);
    assert!(
        !target
            .calls()
            .iter()
            .any(|c| matches!(c, Call::SetMetadata { .. }))
    );
}
