use super::*;
use crate::backend::TestOutcome;
use crate::env::{TestCase, TestDiscovery, TestModule, TestSuite};
use crate::runbook::{ArgScalar, ArgValue, Hdl, Simulator, StageArgs, Testbench};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Discovery answering from a fixed module-name → tests table.
struct ScriptedDiscovery {
    suites: BTreeMap<String, Vec<String>>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl TestDiscovery for ScriptedDiscovery {
    fn discover(&self, module: &TestModule, _search_path: &[PathBuf]) -> Result<TestSuite> {
        self.calls.borrow_mut().push(module.name.clone());
        let tests = self.suites.get(&module.name).ok_or_else(|| {
            anyhow::Error::from(RegmanError::Import {
                id: 1,
                message: format!("no module named '{}'", module.name),
            })
        })?;
        Ok(TestSuite {
            description: None,
            cases: tests
                .iter()
                .map(|name| TestCase {
                    name: name.clone(),
                    doc: None,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Acquire(Simulator),
    Build(BuildRequest),
    Test(TestRequest),
}

#[derive(Default)]
struct RecordingFactory {
    calls: Rc<RefCell<Vec<Call>>>,
    fail_build: bool,
    /// Reply to every test request with no results.
    silent: bool,
}

struct RecordingBackend {
    calls: Rc<RefCell<Vec<Call>>>,
    fail_build: bool,
    silent: bool,
}

impl BackendFactory for RecordingFactory {
    fn acquire(&self, sim: Simulator) -> Result<Box<dyn SimBackend>> {
        self.calls.borrow_mut().push(Call::Acquire(sim));
        Ok(Box::new(RecordingBackend {
            calls: self.calls.clone(),
            fail_build: self.fail_build,
            silent: self.silent,
        }))
    }
}

impl SimBackend for RecordingBackend {
    fn build(&mut self, request: &BuildRequest) -> Result<PathBuf> {
        self.calls.borrow_mut().push(Call::Build(request.clone()));
        if self.fail_build {
            return Err(anyhow!("compilation failed"));
        }
        Ok(PathBuf::from("/build/sim_build"))
    }

    fn test(&mut self, request: &TestRequest) -> Result<TestOutcome> {
        self.calls.borrow_mut().push(Call::Test(request.clone()));
        if self.silent {
            return Ok(TestOutcome::default());
        }
        Ok(TestOutcome {
            results: request
                .testcase
                .iter()
                .map(|name| TestResult {
                    name: name.clone(),
                    passed: !name.contains("fail"),
                })
                .collect(),
        })
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn testbench(tb_top: &str, tags: &[&str], srcs: &[i64]) -> Testbench {
    Testbench {
        path: PathBuf::from(format!("/proj/tb/{tb_top}")),
        srcs: srcs.to_vec(),
        tb_top: tb_top.to_string(),
        rtl_top: Some("dut".to_string()),
        hdl: Hdl::Verilog,
        tags: strings(tags),
        build_args: StageArgs::new(),
        test_args: StageArgs::new(),
    }
}

fn runbook(origin: &str, sim: Simulator, tbs: Vec<(&str, Testbench)>) -> Arc<Runbook> {
    Arc::new(Runbook {
        origin: PathBuf::from(origin),
        title: None,
        sim,
        srcs: BTreeMap::from([
            (0, PathBuf::from("/proj/rtl/a.v")),
            (1, PathBuf::from("/proj/rtl/b.v")),
            (2, PathBuf::from("/proj/rtl/c.v")),
        ]),
        include: vec![PathBuf::from("/proj/lib")],
        build_args: StageArgs::new(),
        test_args: StageArgs::new(),
        tbs: tbs
            .into_iter()
            .map(|(name, tb)| (name.to_string(), tb))
            .collect(),
    })
}

fn env_with(suites: &[(&str, &[&str])]) -> (TestEnv, Rc<RefCell<Vec<String>>>) {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let discovery = ScriptedDiscovery {
        suites: suites
            .iter()
            .map(|(module, tests)| (module.to_string(), strings(tests)))
            .collect(),
        calls: calls.clone(),
    };
    (TestEnv::new(Box::new(discovery)), calls)
}

fn no_filter() -> Filtering {
    Filtering::default()
}

fn filtering(
    tb_names: &[&str],
    include_tests: &[&str],
    exclude_tests: &[&str],
    include_tags: &[&str],
    exclude_tags: &[&str],
) -> Filtering {
    Filtering::new(
        strings(tb_names),
        include_tests,
        exclude_tests,
        include_tags,
        exclude_tags,
    )
    .unwrap()
}

fn plan_names(orchestrator: &Orchestrator) -> Vec<&str> {
    orchestrator
        .plan()
        .iter()
        .map(|entry| entry.tb_name.as_str())
        .collect()
}

#[test]
fn include_tags_select_matching_testbenches_only() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![
            ("tbA", testbench("test_a", &["smoke"], &[0])),
            ("tbB", testbench("test_b", &["regress"], &[0])),
        ],
    );
    let (mut env, calls) = env_with(&[("test_a", &["t1"]), ("test_b", &["t2"])]);
    let mut orchestrator = Orchestrator::new();
    let added = orchestrator
        .build_plan(&mut env, &rb, &filtering(&[], &[], &[], &["smoke"], &[]))
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(plan_names(&orchestrator), vec!["tbA"]);
    assert_eq!(*calls.borrow(), strings(&["test_a"]));
}

#[test]
fn selected_tests_keep_discovery_order() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![("tbA", testbench("test_mod", &[], &[0]))],
    );
    let (mut env, _) = env_with(&[("test_mod", &["test_a", "test_b", "test_c"])]);
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .build_plan(
            &mut env,
            &rb,
            &filtering(&[], &["test_c", "test_a"], &[], &[], &[]),
        )
        .unwrap();
    assert_eq!(orchestrator.plan()[0].tests, strings(&["test_a", "test_c"]));
}

#[test]
fn unknown_explicit_name_lists_available_testbenches() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![("tbA", testbench("test_a", &[], &[0]))],
    );
    let (mut env, calls) = env_with(&[("test_a", &["t1"])]);
    let mut orchestrator = Orchestrator::new();
    let err = orchestrator
        .build_plan(&mut env, &rb, &filtering(&["nonexistent"], &[], &[], &[], &[]))
        .unwrap_err();
    let domain = err.downcast_ref::<RegmanError>().expect("domain error");
    assert_eq!(domain.code(), "CMN-0");
    let message = domain.to_string();
    assert!(message.contains("nonexistent"));
    assert!(message.contains("available: tbA"));
    assert!(calls.borrow().is_empty());
    assert!(orchestrator.plan().is_empty());
}

#[test]
fn explicit_names_keep_request_order_without_duplicates() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![
            ("tbA", testbench("test_a", &[], &[0])),
            ("tbB", testbench("test_b", &[], &[0])),
            ("tbC", testbench("test_c", &[], &[0])),
        ],
    );
    let (mut env, _) = env_with(&[("test_a", &["t"]), ("test_b", &["t"]), ("test_c", &["t"])]);
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .build_plan(&mut env, &rb, &filtering(&["tbC", "tbA", "tbC"], &[], &[], &[], &[]))
        .unwrap();
    assert_eq!(plan_names(&orchestrator), vec!["tbC", "tbA"]);
}

#[test]
fn empty_selections_stay_in_the_plan() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![("tbA", testbench("test_a", &[], &[0]))],
    );
    let (mut env, _) = env_with(&[("test_a", &["test_x"])]);
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .build_plan(&mut env, &rb, &filtering(&[], &["nothing"], &[], &[], &[]))
        .unwrap();
    assert_eq!(orchestrator.plan().len(), 1);
    assert!(orchestrator.plan()[0].tests.is_empty());
    assert_eq!(
        orchestrator.preview(3),
        vec![PreviewEntry {
            tb_name: "tbA".to_string(),
            tests: Vec::new(),
        }]
    );
}

#[test]
fn discovery_failure_aborts_plan_building() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![("tbA", testbench("missing_module", &[], &[0]))],
    );
    let (mut env, _) = env_with(&[]);
    let err = Orchestrator::new()
        .build_plan(&mut env, &rb, &no_filter())
        .unwrap_err();
    let domain = err.downcast_ref::<RegmanError>().expect("domain error");
    assert_eq!(domain.code(), "TEI-1");
}

#[test]
fn repetitions_are_grouped_by_test() {
    assert_eq!(
        expand_repetitions(&strings(&["a", "b"]), 3),
        strings(&["a", "a", "a", "b", "b", "b"])
    );
    assert!(expand_repetitions(&strings(&["a"]), 0).is_empty());
}

#[test]
fn preview_never_touches_the_backend() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![("tbA", testbench("test_a", &[], &[0]))],
    );
    let (mut env, _) = env_with(&[("test_a", &["a", "b"])]);
    let factory = RecordingFactory::default();
    let mut orchestrator = Orchestrator::new();
    orchestrator.build_plan(&mut env, &rb, &no_filter()).unwrap();

    let preview = orchestrator.preview(3);
    assert_eq!(preview[0].tests, strings(&["a", "a", "a", "b", "b", "b"]));
    assert!(factory.calls.borrow().is_empty());
}

#[test]
fn run_builds_then_tests_with_merged_arguments() {
    let mut tb = testbench("test_a", &[], &[2, 0]);
    tb.build_args.insert(
        "defines".to_string(),
        ArgValue::Table(BTreeMap::from([("WIDTH".to_string(), ArgScalar::Int(16))])),
    );
    tb.test_args
        .insert("seed".to_string(), ArgValue::Scalar(ArgScalar::Int(42)));
    let mut rb = Runbook::clone(&runbook("/proj/.regman", Simulator::Verilator, vec![("tbA", tb)]));
    rb.build_args
        .insert("waves".to_string(), ArgValue::Scalar(ArgScalar::Bool(true)));
    rb.test_args
        .insert("seed".to_string(), ArgValue::Scalar(ArgScalar::Int(1)));
    let rb = Arc::new(rb);

    let (mut env, _) = env_with(&[("test_a", &["test_pass", "test_fail"])]);
    let factory = RecordingFactory::default();
    let mut orchestrator = Orchestrator::new();
    orchestrator.build_plan(&mut env, &rb, &no_filter()).unwrap();
    let summary = orchestrator.run(&mut env, &factory, 2).unwrap();

    let calls = factory.calls.borrow();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], Call::Acquire(Simulator::Verilator));
    let Call::Build(build) = &calls[1] else {
        panic!("expected build, got {:?}", calls[1]);
    };
    assert_eq!(
        build.sources,
        vec![PathBuf::from("/proj/rtl/a.v"), PathBuf::from("/proj/rtl/c.v")]
    );
    assert_eq!(build.hdl_toplevel.as_deref(), Some("dut"));
    assert!(build.always);
    assert!(build.args.contains_key("waves"));
    assert!(build.args.contains_key("defines"));

    let Call::Test(test) = &calls[2] else {
        panic!("expected test, got {:?}", calls[2]);
    };
    assert_eq!(test.test_module, "test_a");
    assert_eq!(test.hdl_toplevel_lang, Hdl::Verilog);
    assert_eq!(
        test.testcase,
        strings(&["test_pass", "test_pass", "test_fail", "test_fail"])
    );
    assert_eq!(
        test.results_xml,
        PathBuf::from("/build/sim_build/tbA_results.xml")
    );
    assert_eq!(
        test.args.get("seed"),
        Some(&ArgValue::Scalar(ArgScalar::Int(42)))
    );
    assert_eq!(test.search_path[0], PathBuf::from("/proj/tb/test_a"));
    assert!(test.search_path.contains(&PathBuf::from("/proj/lib")));

    assert_eq!(summary.passed(), 2);
    assert_eq!(summary.failed(), 2);
    assert!(!summary.testbenches[0].skipped);
}

#[test]
fn results_xml_argument_overrides_location_and_is_not_forwarded() {
    let mut tb = testbench("test_a", &[], &[0]);
    tb.test_args.insert(
        RESULTS_XML_ARG.to_string(),
        ArgValue::Scalar(ArgScalar::Str("/out/custom.xml".to_string())),
    );
    let rb = runbook("/proj/.regman", Simulator::Icarus, vec![("tbA", tb)]);
    let (mut env, _) = env_with(&[("test_a", &["t1"])]);
    let factory = RecordingFactory::default();
    let mut orchestrator = Orchestrator::new();
    orchestrator.build_plan(&mut env, &rb, &no_filter()).unwrap();
    let summary = orchestrator.run(&mut env, &factory, 1).unwrap();

    let calls = factory.calls.borrow();
    let Some(Call::Test(test)) = calls.last() else {
        panic!("expected a test call");
    };
    assert_eq!(test.results_xml, PathBuf::from("/out/custom.xml"));
    assert!(!test.args.contains_key(RESULTS_XML_ARG));
    assert_eq!(
        summary.testbenches[0].results_xml,
        Some(PathBuf::from("/out/custom.xml"))
    );
}

#[test]
fn entries_without_tests_are_skipped() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![
            ("tbA", testbench("test_a", &[], &[0])),
            ("tbB", testbench("test_b", &[], &[1])),
        ],
    );
    let (mut env, _) = env_with(&[("test_a", &["t1"]), ("test_b", &[])]);
    let factory = RecordingFactory::default();
    let mut orchestrator = Orchestrator::new();
    orchestrator.build_plan(&mut env, &rb, &no_filter()).unwrap();
    let summary = orchestrator.run(&mut env, &factory, 1).unwrap();

    assert_eq!(factory.calls.borrow().len(), 3);
    assert!(!summary.testbenches[0].skipped);
    assert!(summary.testbenches[1].skipped);
    assert_eq!(summary.testbenches[1].build_dir, None);
}

#[test]
fn backend_is_acquired_once_per_runbook() {
    let first = runbook(
        "/proj/a/.regman",
        Simulator::Icarus,
        vec![
            ("tbA", testbench("test_a", &[], &[0])),
            ("tbB", testbench("test_b", &[], &[0])),
        ],
    );
    let second = runbook(
        "/proj/b/.regman",
        Simulator::Ghdl,
        vec![("tbC", testbench("test_c", &[], &[0]))],
    );
    let (mut env, _) = env_with(&[("test_a", &["t"]), ("test_b", &["t"]), ("test_c", &["t"])]);
    let factory = RecordingFactory::default();
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .build_plan(&mut env, &first, &filtering(&["tbA"], &[], &[], &[], &[]))
        .unwrap();
    orchestrator.build_plan(&mut env, &second, &no_filter()).unwrap();
    orchestrator
        .build_plan(&mut env, &first, &filtering(&["tbB"], &[], &[], &[], &[]))
        .unwrap();
    assert_eq!(plan_names(&orchestrator), vec!["tbA", "tbC", "tbB"]);

    let summary = orchestrator.run(&mut env, &factory, 1).unwrap();
    let acquired: Vec<Simulator> = factory
        .calls
        .borrow()
        .iter()
        .filter_map(|call| match call {
            Call::Acquire(sim) => Some(*sim),
            _ => None,
        })
        .collect();
    assert_eq!(acquired, vec![Simulator::Icarus, Simulator::Ghdl]);
    let order: Vec<&str> = summary
        .testbenches
        .iter()
        .map(|run| run.tb_name.as_str())
        .collect();
    assert_eq!(order, vec!["tbA", "tbB", "tbC"]);
}

#[test]
fn build_failure_stops_the_run() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![
            ("tbA", testbench("test_a", &[], &[0])),
            ("tbB", testbench("test_b", &[], &[0])),
        ],
    );
    let (mut env, _) = env_with(&[("test_a", &["t"]), ("test_b", &["t"])]);
    let factory = RecordingFactory {
        fail_build: true,
        ..RecordingFactory::default()
    };
    let mut orchestrator = Orchestrator::new();
    orchestrator.build_plan(&mut env, &rb, &no_filter()).unwrap();
    let err = orchestrator.run(&mut env, &factory, 1).unwrap_err();
    assert!(format!("{err:#}").contains("build testbench 'tbA'"));
    let builds = factory
        .calls
        .borrow()
        .iter()
        .filter(|call| matches!(call, Call::Build(_)))
        .count();
    assert_eq!(builds, 1);
}

#[test]
fn missing_results_count_as_failures() {
    let rb = runbook(
        "/proj/.regman",
        Simulator::Icarus,
        vec![("tbA", testbench("test_a", &[], &[0]))],
    );
    let (mut env, _) = env_with(&[("test_a", &["t1", "t2"])]);
    let factory = RecordingFactory {
        silent: true,
        ..RecordingFactory::default()
    };
    let mut orchestrator = Orchestrator::new();
    orchestrator.build_plan(&mut env, &rb, &no_filter()).unwrap();
    let summary = orchestrator.run(&mut env, &factory, 2).unwrap();

    assert_eq!(summary.passed(), 0);
    assert_eq!(summary.failed(), 4);
    assert_eq!(
        summary.testbenches[0].results[0],
        TestResult {
            name: "t1".to_string(),
            passed: false,
        }
    );
}
