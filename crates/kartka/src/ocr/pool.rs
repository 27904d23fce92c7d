//! Shared cache of constructed OCR engines.
//!
//! The pool is an ordinary value owned by the caller and handed to the
//! pipeline as `Arc<EnginePool>`. Entries are keyed by
//! [`EngineCacheKey`] and live as long as the pool.
//!
//! # Concurrency
//!
//! Each key maps to its own initialization cell. The map shard lock is only
//! held long enough to fetch or insert that cell, so construction of one key
//! never blocks lookups of another. Threads racing on the same key all wait on
//! the cell: exactly one runs the factory and the others reuse its engine. A
//! failed construction leaves the cell empty and the error goes to the caller
//! that attempted it; nothing is retried automatically.

use super::engine::{EngineFactory, OcrEngine};
use crate::Result;
use crate::core::config::{EngineCacheKey, EngineConfig};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;

type EngineCell = Arc<OnceCell<Arc<dyn OcrEngine>>>;

pub struct EnginePool {
    factory: Arc<dyn EngineFactory>,
    engines: DashMap<EngineCacheKey, EngineCell>,
}

/// Snapshot of one cached engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineInfo {
    pub key: EngineCacheKey,
    pub engine: String,
    pub supported_languages: Vec<String>,
}

impl EnginePool {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            engines: DashMap::new(),
        }
    }

    pub fn factory_name(&self) -> &str {
        self.factory.name()
    }

    /// Return the engine for `config`, constructing it on first use.
    ///
    /// Configs with the same cache key share one instance even when their
    /// thresholds differ; the first construction's parameters win.
    pub fn get_engine(&self, config: &EngineConfig) -> Result<Arc<dyn OcrEngine>> {
        let key = config.cache_key();
        let cell = self.cell_for(&key);

        if let Some(engine) = cell.get() {
            tracing::debug!(key = %key, "Engine cache hit");
            return Ok(Arc::clone(engine));
        }

        let engine = cell.get_or_try_init(|| {
            tracing::debug!(key = %key, factory = self.factory.name(), "Engine cache miss, constructing");
            let started = std::time::Instant::now();
            let engine = self.factory.create(config)?;
            tracing::info!(
                key = %key,
                engine = engine.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "OCR engine initialized"
            );
            Ok::<_, crate::KartkaError>(engine)
        })?;

        Ok(Arc::clone(engine))
    }

    fn cell_for(&self, key: &EngineCacheKey) -> EngineCell {
        if let Some(cell) = self.engines.get(key) {
            return Arc::clone(cell.value());
        }
        Arc::clone(self.engines.entry(key.clone()).or_default().value())
    }

    /// Number of constructed engines.
    pub fn len(&self) -> usize {
        self.engines.iter().filter(|entry| entry.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache keys of constructed engines, sorted.
    pub fn keys(&self) -> Vec<EngineCacheKey> {
        let mut keys: Vec<_> = self
            .engines
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn engine_info(&self) -> Vec<EngineInfo> {
        let mut info: Vec<_> = self
            .engines
            .iter()
            .filter_map(|entry| {
                entry.value().get().map(|engine| EngineInfo {
                    key: entry.key().clone(),
                    engine: engine.name().to_string(),
                    supported_languages: engine.supported_languages(),
                })
            })
            .collect();
        info.sort_by(|a, b| a.key.cmp(&b.key));
        info
    }
}

impl std::fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnginePool")
            .field("factory", &self.factory.name())
            .field("engines", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KartkaError;
    use crate::ocr::normalize::DetectionEntry;
    use crate::raster::StagedRaster;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct StubEngine {
        language: String,
    }

    impl OcrEngine for StubEngine {
        fn name(&self) -> &str {
            "stub"
        }

        fn recognize(&self, _raster: &StagedRaster, _angle: bool) -> Result<Vec<DetectionEntry>> {
            Ok(Vec::new())
        }

        fn supported_languages(&self) -> Vec<String> {
            vec![self.language.clone()]
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl EngineFactory for CountingFactory {
        fn name(&self) -> &str {
            "counting"
        }

        fn create(&self, config: &EngineConfig) -> Result<Arc<dyn OcrEngine>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            if config.language == "xx" {
                return Err(KartkaError::engine_initialization("unknown language 'xx'"));
            }
            Ok(Arc::new(StubEngine {
                language: config.language.clone(),
            }))
        }
    }

    #[test]
    fn test_same_key_returns_same_instance() {
        let factory = Arc::new(CountingFactory::default());
        let pool = EnginePool::new(factory.clone());

        let a = pool.get_engine(&EngineConfig::with_language("pl")).unwrap();
        let b = pool
            .get_engine(&EngineConfig {
                detection_threshold: 0.9,
                recognition_batch_size: 64,
                ..EngineConfig::with_language("pl")
            })
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_distinct_keys_build_distinct_engines() {
        let factory = Arc::new(CountingFactory::default());
        let pool = EnginePool::new(factory.clone());

        let en = pool.get_engine(&EngineConfig::default()).unwrap();
        let gpu = pool
            .get_engine(&EngineConfig {
                use_gpu: true,
                ..EngineConfig::default()
            })
            .unwrap();
        let no_angle = pool
            .get_engine(&EngineConfig {
                angle_classification: false,
                ..EngineConfig::default()
            })
            .unwrap();

        assert!(!Arc::ptr_eq(&en, &gpu));
        assert!(!Arc::ptr_eq(&en, &no_angle));
        assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
        assert_eq!(pool.keys().len(), 3);
    }

    #[test]
    fn test_construction_failure_is_surfaced_and_not_cached() {
        let factory = Arc::new(CountingFactory::default());
        let pool = EnginePool::new(factory.clone());

        let err = pool.get_engine(&EngineConfig::with_language("xx")).err().unwrap();
        assert!(matches!(err, KartkaError::EngineInitialization { .. }));
        assert!(pool.is_empty());

        assert!(pool.get_engine(&EngineConfig::with_language("xx")).is_err());
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_first_use_constructs_once() {
        let factory = Arc::new(CountingFactory {
            calls: AtomicUsize::new(0),
            delay: Some(Duration::from_millis(50)),
        });
        let pool = Arc::new(EnginePool::new(factory.clone()));
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    pool.get_engine(&EngineConfig::with_language("pl")).unwrap()
                })
            })
            .collect();

        let engines: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
        assert!(engines.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_engine_info() {
        let pool = EnginePool::new(Arc::new(CountingFactory::default()));
        assert!(pool.engine_info().is_empty());

        pool.get_engine(&EngineConfig::with_language("pl")).unwrap();
        pool.get_engine(&EngineConfig::with_language("de")).unwrap();

        let info = pool.engine_info();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].key.language, "de");
        assert_eq!(info[1].supported_languages, vec!["pl".to_string()]);
        assert_eq!(info[1].engine, "stub");
    }
}
