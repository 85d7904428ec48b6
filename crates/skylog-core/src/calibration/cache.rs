use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::frame::Frame;
use crate::io::read_pixels;
use crate::record::StoredImage;
use crate::stack::SigmaClipParams;

use super::engine::flat_stack;
use super::resolver::CalibrationResolver;

/// Memoizing map with single-flight computation.
///
/// The first caller for a key runs the producer; concurrent callers for the
/// same key block until that value is ready and then share it. Entries are
/// never evicted, so values live as long as the cache.
pub struct SessionCache<K, V> {
    entries: Mutex<HashMap<K, Arc<OnceLock<V>>>>,
}

impl<K, V> Default for SessionCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> SessionCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished value for `key`, if any. Does not wait for a
    /// computation in progress.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.entries.lock().ok()?.get(key).cloned()?;
        slot.get().cloned()
    }

    pub fn get_or_compute(&self, key: K, producer: impl FnOnce() -> V) -> V {
        // Claim the slot under the map lock, compute outside it.
        let slot = match self.entries.lock() {
            Ok(mut entries) => Arc::clone(entries.entry(key).or_default()),
            Err(_) => return producer(),
        };
        slot.get_or_init(producer).clone()
    }

    /// Keys claimed so far, finished or not.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identifies one master flat: a night and an optical train.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlatKey {
    pub session: NaiveDate,
    pub instrument: Option<String>,
    pub telescope: Option<String>,
    pub filter: Option<String>,
}

impl FlatKey {
    /// `None` when the light has no session yet (no timezone offset).
    pub fn for_light(light: &StoredImage) -> Option<Self> {
        Some(Self {
            session: light.record.night_session()?,
            instrument: light.record.instrument.clone(),
            telescope: light.record.telescope.clone(),
            filter: light.record.filter.clone(),
        })
    }
}

/// One bias-subtracted, sigma-clipped master flat per night and optical
/// train, computed on first use.
///
/// A key whose flats cannot be stacked (no flats, no master bias, unreadable
/// pixels) caches `None`; it is not retried for the cache's lifetime.
pub struct MasterFlatCache {
    resolver: CalibrationResolver,
    params: SigmaClipParams,
    cache: SessionCache<FlatKey, Option<Arc<Frame>>>,
    stacks: AtomicUsize,
}

impl MasterFlatCache {
    pub fn new(resolver: CalibrationResolver, params: SigmaClipParams) -> Self {
        Self {
            resolver,
            params,
            cache: SessionCache::new(),
            stacks: AtomicUsize::new(0),
        }
    }

    /// Master flat for a light's night, filter and optical train.
    pub fn master_flat(&self, light: &StoredImage) -> Option<Arc<Frame>> {
        let key = FlatKey::for_light(light)?;
        self.cache
            .get_or_compute(key.clone(), || match self.build(light) {
                Ok(flat) => flat.map(Arc::new),
                Err(e) => {
                    warn!(session = %key.session, error = %e, "master flat unavailable");
                    None
                }
            })
    }

    /// Already-computed master flat, without triggering a stack.
    pub fn cached(&self, key: &FlatKey) -> Option<Arc<Frame>> {
        self.cache.get(key).flatten()
    }

    /// Number of stacking computations started.
    pub fn stacks_computed(&self) -> usize {
        self.stacks.load(Ordering::SeqCst)
    }

    fn build(&self, light: &StoredImage) -> Result<Option<Frame>> {
        self.stacks.fetch_add(1, Ordering::SeqCst);

        let Some(bias) = self.resolver.flat_bias(light)? else {
            debug!(light = light.id, "no master bias to subtract from flats");
            return Ok(None);
        };
        let flats = self.resolver.resolve_flats(light)?;

        let bias_frame = read_pixels(Path::new(&bias.record.filename))?;
        let frames = flats
            .iter()
            .map(|f| read_pixels(Path::new(&f.record.filename)))
            .collect::<Result<Vec<_>>>()?;

        let master = flat_stack(&frames, &bias_frame, &self.params)?;
        info!(
            light = light.id,
            flats = frames.len(),
            bias = bias.id,
            "stacked master flat"
        );
        Ok(Some(master))
    }
}
