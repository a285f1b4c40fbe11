// Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use quire_common::path::DocumentPath;
use quire_engine::config::WorkspaceConfig;
use quire_engine::git::{CommandExecutor, CommandResult, GitWorker};
use quire_engine::workspace::{BoxFuture, LocalFs, Workspace, WorkspaceFs};
use quire_engine::WorkspaceEngine;
use tempfile::TempDir;

pub fn doc(path: &str) -> DocumentPath {
    DocumentPath::new(path).expect("valid document path")
}

pub fn write(root: &Path, path: &str, content: &str) {
    let absolute = root.join(path);
    if let Some(parent) = absolute.parent() {
        std::fs::create_dir_all(parent).expect("parent directory should be created");
    }
    std::fs::write(absolute, content).expect("file should be written");
}

pub fn read(root: &Path, path: &str) -> String {
    std::fs::read_to_string(root.join(path)).expect("file should be readable")
}

// ── Git executor ───────────────────────────────────────────────────

/// Records every git invocation. Scripted failures are matched by
/// subcommand; everything else succeeds with plausible output.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    failures: Arc<Mutex<VecDeque<(String, String)>>>,
}

impl ScriptedExecutor {
    pub fn fail_on(self, subcommand: &str, stderr: &str) -> Self {
        self.failures
            .lock()
            .expect("failures lock poisoned")
            .push_back((subcommand.to_string(), stderr.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn subcommands(&self) -> Vec<String> {
        self.calls().into_iter().filter_map(|args| args.first().cloned()).collect()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(
        &self,
        _program: &str,
        args: &[String],
        _cwd: &Path,
    ) -> Result<CommandResult, std::io::Error> {
        self.calls.lock().expect("calls lock poisoned").push(args.to_vec());

        let mut failures = self.failures.lock().expect("failures lock poisoned");
        if failures.front().is_some_and(|(subcommand, _)| args.first() == Some(subcommand)) {
            let (_, stderr) = failures.pop_front().expect("front checked above");
            return Ok(CommandResult { success: false, code: Some(1), stdout: String::new(), stderr });
        }

        let stdout = match args.first().map(String::as_str) {
            Some("diff") => "changed.md\n",
            Some("rev-list") => "1\n",
            _ => "",
        };
        Ok(CommandResult {
            success: true,
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }
}

// ── Filesystem ─────────────────────────────────────────────────────

/// `LocalFs` that counts writes and fails reads of chosen paths.
pub struct CountingFs {
    inner: LocalFs,
    writes: AtomicUsize,
    written: Mutex<Vec<DocumentPath>>,
    failing_reads: Mutex<HashSet<DocumentPath>>,
}

impl CountingFs {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            inner: LocalFs::new(workspace),
            writes: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
            failing_reads: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_reads_of(&self, path: &str) {
        self.failing_reads.lock().expect("failing reads lock poisoned").insert(doc(path));
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<DocumentPath> {
        let mut written = self.written.lock().expect("written lock poisoned").clone();
        written.sort();
        written
    }
}

impl WorkspaceFs for CountingFs {
    fn read_to_string<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            if self.failing_reads.lock().expect("failing reads lock poisoned").contains(path) {
                anyhow::bail!("injected read failure for {path}");
            }
            self.inner.read_to_string(path).await
        })
    }

    fn write<'a>(&'a self, path: &'a DocumentPath, content: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.written.lock().expect("written lock poisoned").push(path.clone());
            self.inner.write(path, content).await
        })
    }

    fn exists<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, bool> {
        self.inner.exists(path)
    }

    fn modified<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, anyhow::Result<SystemTime>> {
        self.inner.modified(path)
    }

    fn rename<'a>(
        &'a self,
        from: &'a DocumentPath,
        to: &'a DocumentPath,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        self.inner.rename(from, to)
    }

    fn remove<'a>(&'a self, path: &'a DocumentPath) -> BoxFuture<'a, anyhow::Result<()>> {
        self.inner.remove(path)
    }

    fn list_files<'a>(
        &'a self,
        dir: Option<&'a DocumentPath>,
    ) -> BoxFuture<'a, anyhow::Result<Vec<DocumentPath>>> {
        self.inner.list_files(dir)
    }
}

// ── Engine fixture ─────────────────────────────────────────────────

pub struct Fixture {
    pub tmp: TempDir,
    pub fs: Arc<CountingFs>,
    pub git: ScriptedExecutor,
    pub engine: WorkspaceEngine<ScriptedExecutor>,
}

impl Fixture {
    pub fn root(&self) -> &Path {
        self.engine.workspace().root()
    }
}

pub fn fixture(files: &[(&str, &str)]) -> Fixture {
    fixture_with(files, WorkspaceConfig::default(), ScriptedExecutor::default())
}

pub fn fixture_with(files: &[(&str, &str)], config: WorkspaceConfig, git: ScriptedExecutor) -> Fixture {
    let tmp = TempDir::new().expect("tempdir should be created");
    for (path, content) in files {
        write(tmp.path(), path, content);
    }
    let workspace = Workspace::open(tmp.path()).expect("workspace should open");
    let fs = Arc::new(CountingFs::new(workspace.clone()));
    let worker = GitWorker::with_executor(workspace.root(), git.clone());
    let engine = WorkspaceEngine::with_parts(workspace, config, Arc::clone(&fs) as Arc<dyn WorkspaceFs>, worker);
    Fixture { tmp, fs, git, engine }
}

// ── Real git ───────────────────────────────────────────────────────

pub fn run_git(cwd: &Path, args: &[&str]) {
    let output =
        Command::new("git").args(args).current_dir(cwd).output().expect("git command should run");
    assert!(
        output.status.success(),
        "git {:?} failed:\nstdout: {}\nstderr: {}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn run_git_capture(cwd: &Path, args: &[&str]) -> String {
    let output =
        Command::new("git").args(args).current_dir(cwd).output().expect("git command should run");
    assert!(
        output.status.success(),
        "git {:?} failed:\nstdout: {}\nstderr: {}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf8 output")
}
