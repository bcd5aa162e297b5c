/// Derived-artifact synchronization
///
/// This module keeps thumbnails and album copies consistent with the registry:
/// - Classifying live items against the last snapshot (diff.rs)
/// - Persisting snapshots with atomic replace (snapshot.rs)
/// - Producing artifacts from source files (render.rs)
/// - Driving removals, renders, snapshot writes and orphan sweeps (synchronizer.rs)

pub mod diff;
pub mod render;
pub mod snapshot;
pub mod synchronizer;
