// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shader hot reload.
//!
//! A background thread watches the shader directory. File events are
//! batched until the directory has been quiet for the debounce interval,
//! then every touched file that the [`ShaderLibrary`] knows about is read
//! and handed to [`ShaderLibrary::reload_source`]. The library only
//! publishes a new snapshot when every affected variant compiled, so a
//! broken edit leaves the render thread on the previous shaders.

use crossbeam_channel::{select, unbounded, Receiver, RecvTimeoutError, Sender};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use prism_core::config::RendererSettings;
use prism_core::renderer::ShaderError;
use prism_lanes::shader_library::{ReloadOutcome, ShaderLibrary};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HotReloadError {
    #[error("failed to watch '{path}': {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("failed to read shader '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shader '{file}' was rejected: {source}")]
    Compile {
        file: String,
        #[source]
        source: ShaderError,
    },
}

/// Reads `dir/file` and recompiles the variants built from it.
pub fn reload_file(library: &ShaderLibrary, dir: &Path, file: &str) -> Result<ReloadOutcome, HotReloadError> {
    let path = dir.join(file);
    let text = std::fs::read_to_string(&path).map_err(|source| HotReloadError::Io { path, source })?;
    library
        .reload_source(file, &text)
        .map_err(|source| HotReloadError::Compile {
            file: file.to_string(),
            source,
        })
}

/// Reloads every registered source that has a copy in `dir`.
///
/// Files missing from the directory keep their current source. Returns the
/// outcome per file that was found.
pub fn sync_from_disk(library: &ShaderLibrary, dir: &Path) -> Vec<(String, Result<ReloadOutcome, HotReloadError>)> {
    library
        .source_files()
        .into_iter()
        .filter(|file| dir.join(file).is_file())
        .map(|file| {
            let outcome = reload_file(library, dir, &file);
            log_outcome(&file, &outcome);
            (file, outcome)
        })
        .collect()
}

fn log_outcome(file: &str, outcome: &Result<ReloadOutcome, HotReloadError>) {
    match outcome {
        Ok(ReloadOutcome::Unchanged) => log::debug!("Hot reload: '{file}' unchanged"),
        Ok(ReloadOutcome::Added) => log::info!("Hot reload: '{file}' added"),
        Ok(ReloadOutcome::Recompiled { variants }) => {
            log::info!("Hot reload: '{file}' recompiled ({variants} variants)")
        }
        Err(e) => log::error!("Hot reload: {e}; previous shader stays bound"),
    }
}

/// Watches a shader directory and reloads changed sources in the background.
///
/// The thread stops when the watcher is dropped.
pub struct ShaderWatcher {
    dir: PathBuf,
    debounce: Duration,
    _watcher: RecommendedWatcher,
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ShaderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderWatcher")
            .field("dir", &self.dir)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl ShaderWatcher {
    /// Watches `settings.shader_dir` with `settings.hot_reload_interval()`
    /// as the debounce window.
    ///
    /// Sources already edited on disk are loaded before the watch starts,
    /// so the library never runs on the built-in text of a file the user
    /// has changed.
    pub fn from_settings(settings: &RendererSettings, library: Arc<ShaderLibrary>) -> Result<Self, HotReloadError> {
        sync_from_disk(&library, &settings.shader_dir);
        Self::spawn(library, settings.shader_dir.clone(), settings.hot_reload_interval())
    }

    /// Starts watching `dir`.
    ///
    /// `debounce` is how long the directory must stay quiet before a batch
    /// of changes is compiled; editors often write a file in several steps.
    pub fn spawn(
        library: Arc<ShaderLibrary>,
        dir: impl Into<PathBuf>,
        debounce: Duration,
    ) -> Result<Self, HotReloadError> {
        let dir = dir.into();
        let (event_tx, event_rx) = unbounded::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })
        .map_err(|source| HotReloadError::Watch {
            path: dir.clone(),
            source,
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| HotReloadError::Watch {
                path: dir.clone(),
                source,
            })?;

        let (stop, stop_rx) = unbounded();
        let thread_dir = dir.clone();
        let thread = std::thread::Builder::new()
            .name("prism-shader-watcher".into())
            .spawn(move || watch_loop(&library, &thread_dir, &event_rx, &stop_rx, debounce))
            .map_err(|source| HotReloadError::Io {
                path: dir.clone(),
                source,
            })?;

        log::info!("Hot reload: watching '{}'", dir.display());
        Ok(Self {
            dir,
            debounce,
            _watcher: watcher,
            stop,
            thread: Some(thread),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// How long the directory must stay quiet before a batch compiles.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

impl Drop for ShaderWatcher {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Hot reload: watcher thread panicked");
            }
        }
    }
}

fn touched_files(event: &Event) -> impl Iterator<Item = String> + '_ {
    let relevant = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    event
        .paths
        .iter()
        .filter(move |_| relevant)
        .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
}

fn watch_loop(
    library: &ShaderLibrary,
    dir: &Path,
    events: &Receiver<notify::Result<Event>>,
    stop: &Receiver<()>,
    debounce: Duration,
) {
    loop {
        let first = select! {
            recv(stop) -> _ => return,
            recv(events) -> msg => match msg {
                Ok(event) => event,
                Err(_) => return,
            },
        };

        let mut pending = BTreeSet::new();
        collect(first, &mut pending);
        // Wait for the directory to go quiet.
        loop {
            match events.recv_timeout(debounce) {
                Ok(event) => collect(event, &mut pending),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        if stop.try_recv().is_ok() {
            return;
        }

        let known = library.source_files();
        for file in pending.iter().filter(|f| known.contains(f)) {
            log_outcome(file, &reload_file(library, dir, file));
        }
    }
}

fn collect(event: notify::Result<Event>, pending: &mut BTreeSet<String>) {
    match event {
        Ok(event) => pending.extend(touched_files(&event)),
        Err(e) => log::warn!("Hot reload: watch error: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::ShaderModuleId;
    use prism_lanes::shader_library::{ShaderCompiler, VariantDesc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Accepts any source that does not contain the word `broken`.
    #[derive(Default)]
    struct FakeCompiler {
        next: AtomicUsize,
    }

    impl ShaderCompiler for FakeCompiler {
        fn compile(&self, label: &str, source: &str) -> Result<ShaderModuleId, ShaderError> {
            if source.contains("broken") {
                return Err(ShaderError::CompilationError {
                    label: label.to_string(),
                    details: "syntax error".into(),
                });
            }
            Ok(ShaderModuleId(self.next.fetch_add(1, Ordering::Relaxed)))
        }

        fn release(&self, _module: ShaderModuleId) {}
    }

    fn library_with(file: &str, text: &str) -> Arc<ShaderLibrary> {
        let library = Arc::new(ShaderLibrary::new(Arc::new(FakeCompiler::default())));
        library.register_source(file, text).unwrap();
        library.register_variant(&VariantDesc::new(file, "fs_main")).unwrap();
        library
    }

    #[test]
    fn sync_from_disk_recompiles_only_changed_files() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_with("fog.wgsl", "fn fs_main() {}");
        std::fs::write(dir.path().join("fog.wgsl"), "fn fs_main() {}").unwrap();

        let report = sync_from_disk(&library, dir.path());
        assert_eq!(report.len(), 1);
        assert!(matches!(report[0].1, Ok(ReloadOutcome::Unchanged)));
        let generation = library.generation();

        std::fs::write(dir.path().join("fog.wgsl"), "fn fs_main() { let a = 1; }").unwrap();
        let report = sync_from_disk(&library, dir.path());
        assert!(matches!(report[0].1, Ok(ReloadOutcome::Recompiled { variants: 1 })));
        assert!(library.generation() > generation);
    }

    #[test]
    fn broken_source_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_with("fog.wgsl", "fn fs_main() {}");
        let before = library.snapshot();

        std::fs::write(dir.path().join("fog.wgsl"), "broken").unwrap();
        let err = reload_file(&library, dir.path(), "fog.wgsl").unwrap_err();
        assert!(matches!(err, HotReloadError::Compile { .. }));
        assert!(err.to_string().contains("fog.wgsl"));
        assert_eq!(library.snapshot().generation(), before.generation());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_with("fog.wgsl", "fn fs_main() {}");
        let err = reload_file(&library, dir.path(), "fog.wgsl").unwrap_err();
        assert!(matches!(err, HotReloadError::Io { .. }));
        assert!(sync_from_disk(&library, dir.path()).is_empty());
    }

    #[test]
    fn watcher_picks_up_edits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fog.wgsl"), "fn fs_main() {}").unwrap();
        let library = library_with("fog.wgsl", "fn fs_main() {}");
        let generation = library.generation();

        let watcher = ShaderWatcher::spawn(library.clone(), dir.path(), Duration::from_millis(20)).unwrap();
        assert_eq!(watcher.dir(), dir.path());
        std::fs::write(dir.path().join("fog.wgsl"), "fn fs_main() { let b = 2; }").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while library.generation() == generation && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        drop(watcher);
        assert!(library.generation() > generation);
    }

    #[test]
    fn watcher_follows_renderer_settings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fog.wgsl"), "fn fs_main() { let c = 3; }").unwrap();
        let library = library_with("fog.wgsl", "fn fs_main() {}");
        let generation = library.generation();

        let settings = RendererSettings {
            shader_dir: dir.path().to_path_buf(),
            hot_reload_interval_ms: 15,
            ..Default::default()
        };
        let watcher = ShaderWatcher::from_settings(&settings, library.clone()).unwrap();
        assert_eq!(watcher.dir(), dir.path());
        assert_eq!(watcher.debounce(), Duration::from_millis(15));
        // The edited copy on disk replaced the registered text at startup.
        assert!(library.generation() > generation);
    }

    #[test]
    fn missing_shader_dir_fails_to_watch() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RendererSettings {
            shader_dir: dir.path().join("absent"),
            ..Default::default()
        };
        let library = library_with("fog.wgsl", "fn fs_main() {}");
        let err = ShaderWatcher::from_settings(&settings, library).unwrap_err();
        assert!(matches!(err, HotReloadError::Watch { .. }));
    }
}
