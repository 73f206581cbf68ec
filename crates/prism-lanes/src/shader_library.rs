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

//! Compiled shader variants, published as immutable snapshots.
//!
//! The render thread reads shaders through [`ShaderLibrary::snapshot`], which
//! clones an `Arc` to the current table. Writers (variant registration and
//! the hot-reload watcher) build a complete replacement table off to the
//! side and swap it in under a short write lock, so a reader never observes
//! a half-updated table and a failed recompile never replaces anything.

use prism_core::renderer::{
    GraphicsDevice, ResourceError, ShaderError, ShaderModuleDescriptor, ShaderModuleId,
    ShaderSourceData,
};
use prism_core::viewport::ViewMode;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Turns WGSL text into device shader modules.
pub trait ShaderCompiler: Send + Sync {
    /// Compiles `source`. `label` names the module in diagnostics.
    fn compile(&self, label: &str, source: &str) -> Result<ShaderModuleId, ShaderError>;

    /// Releases a module returned by [`ShaderCompiler::compile`].
    fn release(&self, module: ShaderModuleId);
}

/// Compiles through a [`GraphicsDevice`].
#[derive(Debug, Clone)]
pub struct DeviceShaderCompiler {
    device: Arc<dyn GraphicsDevice>,
}

impl DeviceShaderCompiler {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self { device }
    }
}

impl ShaderCompiler for DeviceShaderCompiler {
    fn compile(&self, label: &str, source: &str) -> Result<ShaderModuleId, ShaderError> {
        self.device
            .create_shader_module(&ShaderModuleDescriptor {
                label: Some(label),
                source: ShaderSourceData::Wgsl(Cow::Borrowed(source)),
            })
            .map_err(|e| match e {
                ResourceError::Shader(inner) => inner,
                other => ShaderError::CompilationError {
                    label: label.to_string(),
                    details: other.to_string(),
                },
            })
    }

    fn release(&self, module: ShaderModuleId) {
        if let Err(e) = self.device.destroy_shader_module(module) {
            log::warn!("DeviceShaderCompiler: failed to release {module:?}: {e}");
        }
    }
}

/// A shader source file plus the entry point and defines of one variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantDesc {
    /// Source file name, as registered with [`ShaderLibrary::register_source`].
    pub file: String,
    /// Entry point the variant is looked up by.
    pub entry: String,
    /// `name = value` constants prepended to the source.
    pub defines: Vec<(String, String)>,
}

impl VariantDesc {
    pub fn new(file: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            entry: entry.into(),
            defines: Vec::new(),
        }
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }

    /// `file + "_" + entry + "_" + name=value...` hashed with FNV-1a.
    pub fn key(&self) -> u64 {
        let mut text = format!("{}_{}_", self.file, self.entry);
        for (name, value) in &self.defines {
            text.push_str(name);
            text.push('=');
            text.push_str(value);
        }
        fnv1a(text.as_bytes())
    }

    fn preprocess(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len() + self.defines.len() * 32);
        for (name, value) in &self.defines {
            out.push_str(&format!("const {name} = {value};\n"));
        }
        out.push_str(source);
        out
    }

    fn label(&self) -> String {
        format!("{}:{}", self.file, self.entry)
    }
}

/// 64-bit FNV-1a.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// A compiled variant. The module is released when the last snapshot
/// holding it goes away.
pub struct CompiledShader {
    desc: VariantDesc,
    module: ShaderModuleId,
    compiler: Arc<dyn ShaderCompiler>,
}

impl CompiledShader {
    pub fn module(&self) -> &ShaderModuleId {
        &self.module
    }

    pub fn desc(&self) -> &VariantDesc {
        &self.desc
    }
}

impl Drop for CompiledShader {
    fn drop(&mut self) {
        self.compiler.release(self.module);
    }
}

impl fmt::Debug for CompiledShader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledShader")
            .field("desc", &self.desc)
            .field("module", &self.module)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct SourceEntry {
    text: Arc<str>,
    hash: u64,
}

/// An immutable view of every compiled variant.
#[derive(Debug, Clone, Default)]
pub struct ShaderSnapshot {
    generation: u64,
    sources: HashMap<String, SourceEntry>,
    variants: HashMap<u64, Arc<CompiledShader>>,
}

impl ShaderSnapshot {
    /// Increases every time a new table is published.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The variant registered under `key`.
    pub fn get(&self, key: u64) -> Option<&Arc<CompiledShader>> {
        self.variants.get(&key)
    }

    /// The module of the variant registered under `key`.
    pub fn module(&self, key: u64) -> Result<&ShaderModuleId, ShaderError> {
        self.variants
            .get(&key)
            .map(|v| v.module())
            .ok_or(ShaderError::UnknownVariant { key })
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn has_source(&self, file: &str) -> bool {
        self.sources.contains_key(file)
    }
}

/// What a reload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new source was registered; nothing was built from it yet.
    Added,
    /// The content hash matched the loaded source.
    Unchanged,
    /// The source was replaced and its variants recompiled.
    Recompiled {
        /// Variants rebuilt from the new source.
        variants: usize,
    },
}

/// The shared shader table.
pub struct ShaderLibrary {
    compiler: Arc<dyn ShaderCompiler>,
    current: RwLock<Arc<ShaderSnapshot>>,
    // Serializes writers; readers only ever take `current`.
    writer: Mutex<()>,
    generation: AtomicU64,
}

impl fmt::Debug for ShaderLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderLibrary")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl ShaderLibrary {
    pub fn new(compiler: Arc<dyn ShaderCompiler>) -> Self {
        Self {
            compiler,
            current: RwLock::new(Arc::new(ShaderSnapshot::default())),
            writer: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// A library preloaded with the built-in WGSL sources.
    pub fn with_builtin_sources(compiler: Arc<dyn ShaderCompiler>) -> Self {
        let library = Self::new(compiler);
        for (file, text) in crate::render_lane::shaders::BUILTIN_SOURCES {
            if let Err(e) = library.register_source(file, text) {
                log::error!("ShaderLibrary: built-in source '{file}' rejected: {e}");
            }
        }
        library
    }

    /// The table currently published.
    pub fn snapshot(&self) -> Arc<ShaderSnapshot> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Generation of the table currently published.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Names of every registered source file.
    pub fn source_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.snapshot().sources.keys().cloned().collect();
        files.sort();
        files
    }

    fn publish(&self, mut next: ShaderSnapshot) -> Arc<ShaderSnapshot> {
        next.generation = self.generation.load(Ordering::Acquire) + 1;
        let next = Arc::new(next);
        match self.current.write() {
            Ok(mut guard) => *guard = next.clone(),
            Err(poisoned) => *poisoned.into_inner() = next.clone(),
        }
        self.generation.store(next.generation, Ordering::Release);
        next
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn compile(&self, desc: &VariantDesc, source: &str) -> Result<Arc<CompiledShader>, ShaderError> {
        let module = self.compiler.compile(&desc.label(), &desc.preprocess(source))?;
        Ok(Arc::new(CompiledShader {
            desc: desc.clone(),
            module,
            compiler: self.compiler.clone(),
        }))
    }

    /// Adds a source file, or replaces it the way [`ShaderLibrary::reload_source`]
    /// does when it already exists.
    pub fn register_source(&self, file: &str, text: &str) -> Result<ReloadOutcome, ShaderError> {
        let _writer = self.lock_writer();
        let current = self.snapshot();
        if current.sources.contains_key(file) {
            return self.replace_source(&current, file, text);
        }
        let mut next = (*current).clone();
        next.sources.insert(
            file.to_string(),
            SourceEntry {
                text: Arc::from(text),
                hash: fnv1a(text.as_bytes()),
            },
        );
        self.publish(next);
        Ok(ReloadOutcome::Added)
    }

    /// Compiles `desc` unless it is already present and returns its key.
    pub fn register_variant(&self, desc: &VariantDesc) -> Result<u64, ShaderError> {
        let key = desc.key();
        let _writer = self.lock_writer();
        let current = self.snapshot();
        if current.variants.contains_key(&key) {
            return Ok(key);
        }
        let source = current
            .sources
            .get(&desc.file)
            .ok_or_else(|| ShaderError::LoadError {
                path: desc.file.clone(),
                source_error: "source is not registered".to_string(),
            })?;
        let compiled = self.compile(desc, &source.text)?;

        let mut next = (*current).clone();
        next.variants.insert(key, compiled);
        self.publish(next);
        log::debug!("ShaderLibrary: compiled {} ({key:#018x})", desc.label());
        Ok(key)
    }

    /// Replaces the source of `file` and recompiles every variant built
    /// from it.
    ///
    /// All variants must compile for the new table to be published; on any
    /// failure the previous table, source included, stays current.
    pub fn reload_source(&self, file: &str, text: &str) -> Result<ReloadOutcome, ShaderError> {
        let _writer = self.lock_writer();
        let current = self.snapshot();
        self.replace_source(&current, file, text)
    }

    // Callers hold the writer lock for the whole compile and publish.
    fn replace_source(
        &self,
        current: &ShaderSnapshot,
        file: &str,
        text: &str,
    ) -> Result<ReloadOutcome, ShaderError> {
        let previous = current.sources.get(file).ok_or_else(|| ShaderError::LoadError {
            path: file.to_string(),
            source_error: "source is not registered".to_string(),
        })?;

        let hash = fnv1a(text.as_bytes());
        if previous.hash == hash {
            return Ok(ReloadOutcome::Unchanged);
        }

        let mut rebuilt = Vec::new();
        for (key, variant) in current.variants.iter().filter(|(_, v)| v.desc.file == file) {
            rebuilt.push((*key, self.compile(&variant.desc, text)?));
        }

        let count = rebuilt.len();
        let mut next = current.clone();
        next.sources.insert(
            file.to_string(),
            SourceEntry {
                text: Arc::from(text),
                hash,
            },
        );
        next.variants.extend(rebuilt);
        let published = self.publish(next);
        log::info!(
            "ShaderLibrary: reloaded '{file}' ({count} variants, generation {})",
            published.generation
        );
        Ok(ReloadOutcome::Recompiled { variants: count })
    }
}

/// Shading model selected by a view mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadingVariant {
    Phong,
    Lambert,
    Gouraud,
    Unlit,
    WorldNormal,
}

impl ShadingVariant {
    pub const ALL: [ShadingVariant; 5] = [
        ShadingVariant::Phong,
        ShadingVariant::Lambert,
        ShadingVariant::Gouraud,
        ShadingVariant::Unlit,
        ShadingVariant::WorldNormal,
    ];

    /// Pure lookup; the shaders themselves never branch on the view mode.
    pub fn for_view_mode(mode: ViewMode) -> Self {
        match mode {
            ViewMode::LitPhong => ShadingVariant::Phong,
            ViewMode::LitLambert => ShadingVariant::Lambert,
            ViewMode::LitGouraud => ShadingVariant::Gouraud,
            ViewMode::WorldNormal => ShadingVariant::WorldNormal,
            ViewMode::Unlit | ViewMode::Wireframe | ViewMode::SceneDepth | ViewMode::LightDebug => {
                ShadingVariant::Unlit
            }
        }
    }

    pub fn vertex_entry(self) -> &'static str {
        match self {
            ShadingVariant::Gouraud => "vs_gouraud",
            _ => "vs_main",
        }
    }

    pub fn fragment_entry(self) -> &'static str {
        match self {
            ShadingVariant::Phong => "fs_phong",
            ShadingVariant::Lambert => "fs_lambert",
            ShadingVariant::Gouraud => "fs_gouraud",
            ShadingVariant::Unlit => "fs_unlit",
            ShadingVariant::WorldNormal => "fs_world_normal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Rejects any source containing `#error`.
    #[derive(Debug, Default)]
    struct FakeCompiler {
        next: AtomicUsize,
        pub released: AtomicUsize,
        pub compiled: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub delay_ms: u64,
    }

    impl ShaderCompiler for FakeCompiler {
        fn compile(&self, label: &str, source: &str) -> Result<ShaderModuleId, ShaderError> {
            if source.contains("#error") {
                return Err(ShaderError::CompilationError {
                    label: label.to_string(),
                    details: "syntax error".to_string(),
                });
            }
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            if self.delay_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(self.delay_ms));
            }
            self.compiled.lock().unwrap().push(source.to_string());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ShaderModuleId(self.next.fetch_add(1, Ordering::Relaxed)))
        }

        fn release(&self, _module: ShaderModuleId) {
            self.released.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn library() -> (Arc<FakeCompiler>, ShaderLibrary) {
        let compiler = Arc::new(FakeCompiler::default());
        let library = ShaderLibrary::new(compiler.clone());
        library.register_source("mesh.wgsl", "fn main() {}").unwrap();
        (compiler, library)
    }

    #[test]
    fn test_key_depends_on_every_part() {
        let base = VariantDesc::new("mesh.wgsl", "fs_phong");
        let other_entry = VariantDesc::new("mesh.wgsl", "fs_lambert");
        let with_define = base.clone().with_define("USE_TEXTURE", "1");
        assert_ne!(base.key(), other_entry.key());
        assert_ne!(base.key(), with_define.key());
        assert_eq!(base.key(), VariantDesc::new("mesh.wgsl", "fs_phong").key());
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn test_defines_are_prepended() {
        let (compiler, library) = library();
        let desc = VariantDesc::new("mesh.wgsl", "fs_phong").with_define("TILE", "16u");
        library.register_variant(&desc).unwrap();
        let compiled = compiler.compiled.lock().unwrap();
        assert_eq!(compiled[0], "const TILE = 16u;\nfn main() {}");
    }

    #[test]
    fn test_register_variant_is_idempotent() {
        let (compiler, library) = library();
        let desc = VariantDesc::new("mesh.wgsl", "fs_phong");
        let a = library.register_variant(&desc).unwrap();
        let generation = library.generation();
        let b = library.register_variant(&desc).unwrap();
        assert_eq!(a, b);
        assert_eq!(library.generation(), generation);
        assert_eq!(compiler.compiled.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_source_and_variant() {
        let (_compiler, library) = library();
        let err = library.register_variant(&VariantDesc::new("nope.wgsl", "main")).unwrap_err();
        assert!(matches!(err, ShaderError::LoadError { .. }));
        assert_eq!(
            library.snapshot().module(42),
            Err(ShaderError::UnknownVariant { key: 42 })
        );
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let (compiler, library) = library();
        let key = library.register_variant(&VariantDesc::new("mesh.wgsl", "fs_phong")).unwrap();
        let before = library.snapshot();

        assert_eq!(
            library.reload_source("mesh.wgsl", "fn main() {}").unwrap(),
            ReloadOutcome::Unchanged
        );
        assert_eq!(
            library.reload_source("mesh.wgsl", "fn main() { let a = 1; }").unwrap(),
            ReloadOutcome::Recompiled { variants: 1 }
        );

        let after = library.snapshot();
        assert!(after.generation() > before.generation());
        assert_ne!(before.module(key).unwrap(), after.module(key).unwrap());
        // The old module lives as long as a reader holds the old snapshot.
        assert_eq!(compiler.released.load(Ordering::Relaxed), 0);
        drop(before);
        assert_eq!(compiler.released.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_register_reports_added_then_recompiled() {
        let (_compiler, library) = library();
        assert_eq!(library.register_source("fog.wgsl", "fn a() {}").unwrap(), ReloadOutcome::Added);
        library.register_variant(&VariantDesc::new("fog.wgsl", "fs_main")).unwrap();
        library.register_variant(&VariantDesc::new("fog.wgsl", "fs_other")).unwrap();
        assert_eq!(
            library.register_source("fog.wgsl", "fn b() {}").unwrap(),
            ReloadOutcome::Recompiled { variants: 2 }
        );
        assert_eq!(library.register_source("fog.wgsl", "fn b() {}").unwrap(), ReloadOutcome::Unchanged);
    }

    #[test]
    fn test_concurrent_reloads_compile_one_at_a_time() {
        let compiler = Arc::new(FakeCompiler {
            delay_ms: 20,
            ..Default::default()
        });
        let library = Arc::new(ShaderLibrary::new(compiler.clone()));
        library.register_source("mesh.wgsl", "fn main() {}").unwrap();
        let key = library.register_variant(&VariantDesc::new("mesh.wgsl", "fs_phong")).unwrap();
        let generation = library.generation();

        let threads: Vec<_> = ["fn main() { let a = 1; }", "fn main() { let b = 2; }"]
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let library = library.clone();
                std::thread::spawn(move || {
                    if i == 0 {
                        library.register_source("mesh.wgsl", text)
                    } else {
                        library.reload_source("mesh.wgsl", text)
                    }
                })
            })
            .collect();
        for thread in threads {
            assert_eq!(thread.join().unwrap().unwrap(), ReloadOutcome::Recompiled { variants: 1 });
        }

        assert_eq!(compiler.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(library.generation(), generation + 2);
        // The published module was compiled from the published source.
        let snapshot = library.snapshot();
        let last_compiled = compiler.compiled.lock().unwrap().last().cloned().unwrap();
        assert_eq!(&*snapshot.sources["mesh.wgsl"].text, last_compiled.as_str());
        assert!(snapshot.module(key).is_ok());
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let (_compiler, library) = library();
        let key = library.register_variant(&VariantDesc::new("mesh.wgsl", "fs_phong")).unwrap();
        let before = library.snapshot();

        let err = library.reload_source("mesh.wgsl", "#error").unwrap_err();
        assert!(matches!(err, ShaderError::CompilationError { .. }));

        let after = library.snapshot();
        assert_eq!(after.generation(), before.generation());
        assert_eq!(after.module(key), before.module(key));
        // The broken text was not stored either, so the same edit is retried.
        assert!(library.reload_source("mesh.wgsl", "#error").is_err());
    }

    #[test]
    fn test_view_mode_lookup() {
        assert_eq!(ShadingVariant::for_view_mode(ViewMode::LitPhong), ShadingVariant::Phong);
        assert_eq!(ShadingVariant::for_view_mode(ViewMode::Wireframe), ShadingVariant::Unlit);
        assert_eq!(ShadingVariant::for_view_mode(ViewMode::SceneDepth), ShadingVariant::Unlit);
        assert_eq!(
            ShadingVariant::for_view_mode(ViewMode::WorldNormal),
            ShadingVariant::WorldNormal
        );
        let entries: std::collections::HashSet<_> =
            ShadingVariant::ALL.iter().map(|v| v.fragment_entry()).collect();
        assert_eq!(entries.len(), ShadingVariant::ALL.len());
    }
}
