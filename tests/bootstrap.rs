use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use shotkeeper::config::{ApplicationConfig, HotkeysConfig, UploadersConfig};
use shotkeeper::instance::InstanceArbiter;
use shotkeeper::paths::PathResolver;
use shotkeeper::{
    AppResult, ApplicationContext, Bootstrap, BootstrapOptions, LoadGate, RunOutcome, Shell,
};
use tempfile::TempDir;

/// A shell that becomes ready when run and quits when told to.
struct TestShell {
    ctx: Arc<ApplicationContext>,
    ready: AtomicBool,
    quit: LoadGate,
    hold_open: bool,
    settings_loaded_at_run: AtomicBool,
    received: Mutex<Vec<Vec<String>>>,
}

impl TestShell {
    fn new(ctx: Arc<ApplicationContext>, hold_open: bool) -> Self {
        Self {
            ctx,
            ready: AtomicBool::new(false),
            quit: LoadGate::new(),
            hold_open,
            settings_loaded_at_run: AtomicBool::new(false),
            received: Mutex::new(Vec::new()),
        }
    }
}

impl Shell for TestShell {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_visible(&self) -> bool {
        true
    }

    fn is_tray_icon_visible(&self) -> bool {
        false
    }

    fn set_tray_icon_visible(&self, _visible: bool) {}

    fn show_activate(&self) {}

    fn use_command_line_args(&self, args: &[String]) {
        self.received.lock().unwrap().push(args.to_vec());
    }

    fn run(&self) -> AppResult<()> {
        self.settings_loaded_at_run
            .store(self.ctx.settings.get().is_some(), Ordering::SeqCst);
        self.ready.store(true, Ordering::SeqCst);
        if self.hold_open {
            self.quit.wait_timeout(Duration::from_secs(30));
        }
        Ok(())
    }
}

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("install")).unwrap();
        std::fs::create_dir_all(dir.path().join("Documents")).unwrap();
        std::fs::create_dir_all(dir.path().join("run")).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn bootstrap(&self, app_id: &str) -> Bootstrap {
        let options = BootstrapOptions {
            app_id: app_id.to_string(),
            install_fault_handlers: false,
            ..Default::default()
        };
        Bootstrap::new(options)
            .with_resolver(PathResolver::new(
                "ShotKeeper",
                self.path("install"),
                self.path("Documents"),
            ))
            .with_arbiter(InstanceArbiter::with_runtime_dir(app_id, self.path("run")))
    }
}

fn unique_id() -> String {
    format!("shotkeeper-it-{}", uuid::Uuid::new_v4().simple())
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn wait_for_batches(shell: &TestShell, timeout: Duration) -> Vec<Vec<String>> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let received = shell.received.lock().unwrap().clone();
        if !received.is_empty() || std::time::Instant::now() >= deadline {
            return received;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn first_run_creates_default_personal_path_and_settings() {
    let sandbox = Sandbox::new();
    let captured: Arc<Mutex<Option<Arc<TestShell>>>> = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&captured);
    let outcome = sandbox
        .bootstrap(&unique_id())
        .run(Vec::new(), move |ctx, _runtime| {
            let shell = Arc::new(TestShell::new(ctx, false));
            *slot.lock().unwrap() = Some(Arc::clone(&shell));
            shell as Arc<dyn Shell>
        })
        .unwrap();

    assert_eq!(outcome, RunOutcome::Finished);
    let shell = captured.lock().unwrap().take().unwrap();
    assert!(shell.settings_loaded_at_run.load(Ordering::SeqCst));
    assert!(shell.ctx.settings.gate().is_set());

    let personal = sandbox.path("Documents").join("ShotKeeper");
    assert_eq!(shell.ctx.paths().personal_path(), Some(personal.as_path()));

    let saved: ApplicationConfig = read_json(&personal.join("ApplicationConfig.json"));
    assert_eq!(saved.default_task_settings, ApplicationConfig::default().default_task_settings);
    assert!(personal.join("Backup").is_dir());
    assert!(personal.join("Logs").is_dir());
}

#[test]
fn sandbox_run_writes_nothing() {
    let sandbox = Sandbox::new();
    let captured: Arc<Mutex<Option<Arc<TestShell>>>> = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&captured);
    let outcome = sandbox
        .bootstrap(&unique_id())
        .run(args(&["--sandbox"]), move |ctx, _runtime| {
            let shell = Arc::new(TestShell::new(ctx, false));
            *slot.lock().unwrap() = Some(Arc::clone(&shell));
            shell as Arc<dyn Shell>
        })
        .unwrap();

    assert_eq!(outcome, RunOutcome::Finished);
    let shell = captured.lock().unwrap().take().unwrap();
    let paths = shell.ctx.paths();
    assert_eq!(paths.application_config_file_path(), None);
    assert_eq!(paths.uploaders_config_file_path(), None);
    assert_eq!(paths.hotkeys_config_file_path(), None);
    assert_eq!(paths.history_file_path(), None);

    // Documents were still loaded (as defaults) but nothing touched the disk.
    assert_eq!(*shell.ctx.settings.get().unwrap(), ApplicationConfig::default());
    assert!(is_empty_dir(&sandbox.path("install")));
    assert!(is_empty_dir(&sandbox.path("Documents")));
}

#[test]
fn second_launch_forwards_arguments_to_primary() {
    let sandbox = Arc::new(Sandbox::new());
    let app_id = unique_id();
    let captured: Arc<Mutex<Option<Arc<TestShell>>>> = Arc::new(Mutex::new(None));
    let started = Arc::new(LoadGate::new());

    let primary = {
        let sandbox = Arc::clone(&sandbox);
        let app_id = app_id.clone();
        let slot = Arc::clone(&captured);
        let started = Arc::clone(&started);
        thread::spawn(move || {
            sandbox.bootstrap(&app_id).run(Vec::new(), move |ctx, _runtime| {
                let shell = Arc::new(TestShell::new(ctx, true));
                *slot.lock().unwrap() = Some(Arc::clone(&shell));
                started.set();
                shell as Arc<dyn Shell>
            })
        })
    };

    assert!(started.wait_timeout(Duration::from_secs(10)));
    let shell = captured.lock().unwrap().clone().unwrap();

    let outcome = sandbox
        .bootstrap(&app_id)
        .run(args(&["foo.png"]), |_ctx, _runtime| {
            panic!("a forwarding launch must not build a shell")
        })
        .unwrap();
    assert_eq!(outcome, RunOutcome::Forwarded);

    let received = wait_for_batches(&shell, Duration::from_secs(5));
    assert_eq!(received, vec![args(&["foo.png"])]);

    assert!(shell.ctx.hotkeys_config.gate().wait_timeout(Duration::from_secs(5)));
    shell.quit.set();
    assert_eq!(primary.join().unwrap().unwrap(), RunOutcome::Finished);

    // Saved by the primary at shutdown
    let personal = sandbox.path("Documents").join("ShotKeeper");
    let uploaders: UploadersConfig = read_json(&personal.join("UploadersConfig.json"));
    assert_eq!(uploaders.custom_uploaders, UploadersConfig::default().custom_uploaders);
    let hotkeys: HotkeysConfig = read_json(&personal.join("HotkeysConfig.json"));
    assert_eq!(hotkeys.hotkeys, HotkeysConfig::default().hotkeys);
}

#[test]
fn launch_during_slow_window_build_is_not_lost() {
    let sandbox = Arc::new(Sandbox::new());
    let app_id = unique_id();
    let captured: Arc<Mutex<Option<Arc<TestShell>>>> = Arc::new(Mutex::new(None));
    let building = Arc::new(LoadGate::new());

    let primary = {
        let sandbox = Arc::clone(&sandbox);
        let app_id = app_id.clone();
        let slot = Arc::clone(&captured);
        let building = Arc::clone(&building);
        thread::spawn(move || {
            sandbox.bootstrap(&app_id).run(Vec::new(), move |ctx, _runtime| {
                building.set();
                // Longer than a secondary launch is willing to look for the endpoint
                thread::sleep(Duration::from_millis(3500));
                let shell = Arc::new(TestShell::new(ctx, true));
                *slot.lock().unwrap() = Some(Arc::clone(&shell));
                shell as Arc<dyn Shell>
            })
        })
    };

    assert!(building.wait_timeout(Duration::from_secs(10)));
    let outcome = sandbox
        .bootstrap(&app_id)
        .run(args(&["early.png"]), |_ctx, _runtime| {
            panic!("a forwarding launch must not build a shell")
        })
        .unwrap();
    assert_eq!(outcome, RunOutcome::Forwarded);

    let mut shell = None;
    for _ in 0..1000 {
        shell = captured.lock().unwrap().clone();
        if shell.is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    let shell = shell.unwrap();
    assert_eq!(wait_for_batches(&shell, Duration::from_secs(5)), vec![args(&["early.png"])]);

    shell.quit.set();
    assert_eq!(primary.join().unwrap().unwrap(), RunOutcome::Finished);
}

#[test]
fn multi_instance_runs_alongside_primary() {
    let sandbox = Sandbox::new();
    let app_id = unique_id();

    let arbiter = InstanceArbiter::with_runtime_dir(&app_id, sandbox.path("run"));
    let _held = arbiter.acquire(false);

    let outcome = sandbox
        .bootstrap(&app_id)
        .run(args(&["-M"]), |ctx, _runtime| {
            Arc::new(TestShell::new(ctx, false)) as Arc<dyn Shell>
        })
        .unwrap();
    assert_eq!(outcome, RunOutcome::Finished);
}
