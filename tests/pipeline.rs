//! Pipeline phases, run ledger and resume.
//!
//! Run with: cargo test --test pipeline

use std::sync::{Arc, Barrier};

use deckhand::domain::entities::{Descriptor, InfrastructureDecl, PhaseState};
use deckhand::domain::ports::{PhaseContext, PluginMeta};
use deckhand::testing::{test_core, MockSink, StubApp, StubInfra, TestCoreOpts};
use deckhand::{DeckhandError, DirectoryStore, Infrastructure, Phase, Stage};

fn two_infra_descriptor() -> Descriptor {
    Descriptor::single("shop", "test", InfrastructureDecl::new("prod", "test", "test"))
        .with_infrastructure(InfrastructureDecl::new("edge", "test", "small"))
}

#[test]
fn full_run_records_every_phase() {
    let app = Arc::new(StubApp::new("shop"));
    let (core, dir) = test_core(Some(TestCoreOpts {
        app: Some(app.clone()),
        ..TestCoreOpts::default()
    }))
    .unwrap();

    for phase in Phase::ALL {
        core.run(phase).unwrap();
    }

    assert_eq!(app.calls(), vec![Phase::Compile, Phase::Build, Phase::Deploy]);
    assert!(dir.path().join("compile/app/compile.done").is_file());
    assert!(dir.path().join("local/app/build.done").is_file());
    assert!(dir.path().join("local/app/deploy.done").is_file());

    let run = core.ledger().load(core.app_tuple()).unwrap().unwrap();
    for phase in Phase::ALL {
        let status = run.status(phase).unwrap();
        assert_eq!(status.state, PhaseState::Succeeded, "{phase}");
        assert_eq!(status.attempts, 1);
    }

    // The plugin wrote through its own namespace only
    let scoped = core.directory().get("app/test/test/test", "last").unwrap();
    assert_eq!(scoped.payload, b"deploy");
}

#[test]
fn infra_phase_provisions_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let infra = Arc::new(StubInfra::new("test").with_rendezvous(barrier));
    let (core, dir) = test_core(Some(TestCoreOpts {
        descriptor: Some(two_infra_descriptor()),
        infra: Some(infra.clone()),
        ..TestCoreOpts::default()
    }))
    .unwrap();

    // Each branch waits for the other; sequential provisioning would hang
    core.run(Phase::Infra).unwrap();

    let mut provisioned: Vec<String> = infra.calls().into_iter().map(|(name, _)| name).collect();
    provisioned.sort();
    assert_eq!(provisioned, vec!["edge", "prod"]);
    assert!(dir.path().join("local/infra-prod/execute.done").is_file());
    assert!(dir.path().join("local/infra-edge/execute.done").is_file());
}

#[test]
fn failing_branch_does_not_abort_siblings() {
    let infra = Arc::new(StubInfra::new("test").failing_for("prod"));
    let sink = Arc::new(MockSink::new());
    let (core, dir) = test_core(Some(TestCoreOpts {
        descriptor: Some(two_infra_descriptor()),
        infra: Some(infra.clone()),
        sink: Some(sink.clone()),
        ..TestCoreOpts::default()
    }))
    .unwrap();

    let err = core.run(Phase::Infra).unwrap_err();
    assert_eq!(err.stage, Stage::Phase(Phase::Infra));
    assert_eq!(err.failures.len(), 1);
    assert!(err.failed("infra prod"));
    assert!(dir.path().join("local/infra-edge/execute.done").is_file());

    assert!(sink
        .messages()
        .iter()
        .any(|m| m == "mock:error:infra: infra prod: prod could not execute"));

    let run = core.ledger().load(core.app_tuple()).unwrap().unwrap();
    let status = run.status(Phase::Infra).unwrap();
    assert_eq!(status.state, PhaseState::Failed);
    assert_eq!(
        status.error.as_deref(),
        Some("infra prod: prod could not execute")
    );
}

/// Panics while provisioning `prod`; every other call goes to the stub
struct PanickingInfra(StubInfra);

impl Infrastructure for PanickingInfra {
    fn meta(&self) -> PluginMeta {
        self.0.meta()
    }

    fn flavors(&self) -> Vec<String> {
        self.0.flavors()
    }

    fn compile(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        self.0.compile(ctx)
    }

    fn execute(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        if ctx.infra_name == Some("prod") {
            panic!("provider client crashed");
        }
        self.0.execute(ctx)
    }

    fn destroy(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        self.0.destroy(ctx)
    }
}

#[test]
fn panicking_branch_is_reported_and_siblings_finish() {
    let infra: Arc<dyn Infrastructure> = Arc::new(PanickingInfra(StubInfra::new("test")));
    let (core, dir) = test_core(Some(TestCoreOpts {
        descriptor: Some(two_infra_descriptor()),
        infra: Some(infra),
        ..TestCoreOpts::default()
    }))
    .unwrap();

    let err = core.run(Phase::Infra).unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert!(err.failed("infra prod"));
    assert_eq!(err.failures[0].message, "plugin panicked");
    assert!(dir.path().join("local/infra-edge/execute.done").is_file());

    let run = core.ledger().load(core.app_tuple()).unwrap().unwrap();
    assert_eq!(run.status(Phase::Infra).unwrap().state, PhaseState::Failed);
}

#[test]
fn unregistered_app_fails_only_its_phase() {
    let (core, _dir) = test_core(Some(TestCoreOpts {
        descriptor: Some(Descriptor::single(
            "shop",
            "rails",
            InfrastructureDecl::new("prod", "test", "test"),
        )),
        ..TestCoreOpts::default()
    }))
    .unwrap();

    let err = core.run(Phase::Build).unwrap_err();
    assert!(err.failed("app (rails, test, test)"));
    assert!(err.failures[0].message.contains("no application registered"));

    // Infrastructure work is unaffected
    core.run(Phase::Infra).unwrap();
}

#[test]
fn unsupported_flavor_is_a_branch_failure() {
    let infra: Arc<dyn Infrastructure> = Arc::new(StubInfra::new("test").with_flavors(&["test"]));
    let (core, _dir) = test_core(Some(TestCoreOpts {
        descriptor: Some(two_infra_descriptor()),
        infra: Some(infra),
        ..TestCoreOpts::default()
    }))
    .unwrap();

    let err = core.run(Phase::Compile).unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert!(err.failed("infra edge"));
    assert!(err.failures[0].message.contains("flavor 'small'"));
}

#[test]
fn resume_skips_succeeded_phases() {
    let app = Arc::new(StubApp::new("shop").failing_on(Phase::Build));
    let (core, dir) = test_core(Some(TestCoreOpts {
        app: Some(app.clone()),
        ..TestCoreOpts::default()
    }))
    .unwrap();

    let err = core.resume().unwrap_err();
    assert!(matches!(err, DeckhandError::Phase(ref e) if e.stage == Stage::Phase(Phase::Build)));
    assert_eq!(app.calls(), vec![Phase::Compile, Phase::Build]);

    // A fresh core over the same state picks up at the failed phase
    let fixed = Arc::new(StubApp::new("shop"));
    let (config, _unused) = deckhand::testing::test_core_config().unwrap();
    let config = config
        .with_compile_dir(dir.path().join("compile"))
        .with_local_dir(dir.path().join("local"))
        .with_data_dir(dir.path().join("data"))
        .with_directory(Arc::clone(core.directory()));
    config
        .apps
        .register_instance(
            deckhand::testing::test_app_tuple(),
            fixed.clone() as Arc<dyn deckhand::App>,
        )
        .unwrap();
    let resumed = deckhand::Core::new(config).unwrap();

    let ran = resumed.resume().unwrap();
    assert_eq!(ran, vec![Phase::Build, Phase::Deploy]);
    assert_eq!(fixed.calls(), vec![Phase::Build, Phase::Deploy]);

    let run = resumed.ledger().load(resumed.app_tuple()).unwrap().unwrap();
    assert_eq!(run.status(Phase::Build).unwrap().attempts, 2);

    // Nothing left to do
    assert!(resumed.resume().unwrap().is_empty());
}

#[test]
fn destroy_runs_in_reverse_order_and_clears_ledger() {
    let infra = Arc::new(StubInfra::new("test"));
    let (core, _dir) = test_core(Some(TestCoreOpts {
        descriptor: Some(two_infra_descriptor()),
        infra: Some(infra.clone()),
        ..TestCoreOpts::default()
    }))
    .unwrap();

    core.run(Phase::Infra).unwrap();
    core.destroy().unwrap();

    let teardown: Vec<String> = infra
        .calls()
        .into_iter()
        .filter(|(_, step)| *step == "destroy")
        .map(|(name, _)| name)
        .collect();
    assert_eq!(teardown, vec!["edge", "prod"]);
    assert!(core.ledger().load(core.app_tuple()).unwrap().is_none());
}

#[test]
fn failed_destroy_keeps_going_and_keeps_ledger() {
    let infra = Arc::new(StubInfra::new("test").failing_for("edge"));
    let (core, _dir) = test_core(Some(TestCoreOpts {
        descriptor: Some(two_infra_descriptor()),
        infra: Some(infra.clone()),
        ..TestCoreOpts::default()
    }))
    .unwrap();

    core.run(Phase::Compile).unwrap_err();
    let err = core.destroy().unwrap_err();
    assert_eq!(err.stage, Stage::Destroy);
    assert!(err.failed("infra edge"));
    assert!(infra
        .calls()
        .contains(&("prod".to_string(), "destroy")));
    assert!(core.ledger().load(core.app_tuple()).unwrap().is_some());
}
