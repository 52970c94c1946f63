use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    sync::mpsc::{channel, Receiver, Sender, TryRecvError},
    thread::JoinHandle,
};

const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("unusable mesh: {0}")]
    Mesh(String),
    #[error("loading stopped before the model was read")]
    Interrupted,
}

/// A parsed model, ready to be spawned into a scene on the main thread.
pub struct LoadedAsset {
    pub name: String,
    pub document: gltf::Document,
    pub buffers: Vec<gltf::buffer::Data>,
}

pub enum AssetEvent {
    Progress { loaded: u64, total: u64 },
    Loaded(LoadedAsset),
    Failed(AssetError),
}

/// Loads one model file on a worker thread.
///
/// Events are queued on a channel and drained by the render loop with `poll`, so loading never
/// blocks a frame.
pub struct AssetLoader {
    path: PathBuf,
    receiver: Receiver<AssetEvent>,
    worker: Option<JoinHandle<()>>,
    finished: bool,
}

impl AssetLoader {
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        Self::spawn_with(path, load)
    }

    fn spawn_with<F>(path: impl Into<PathBuf>, job: F) -> Self
    where
        F: FnOnce(&Path, &Sender<AssetEvent>) -> Result<LoadedAsset, AssetError> + Send + 'static,
    {
        let path: PathBuf = path.into();
        let (sender, receiver) = channel();

        let worker_path = path.clone();
        let worker = std::thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || {
                let event = match job(&worker_path, &sender) {
                    Ok(asset) => AssetEvent::Loaded(asset),
                    Err(error) => AssetEvent::Failed(error),
                };
                // The receiver is gone if the app shut down mid-load
                let _ = sender.send(event);
            });

        // A thread that never started drops its sender, which `poll` reports as a failure
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(error) => {
                log::error!("Failed to start asset loader thread: {}", error);
                None
            }
        };

        Self {
            path,
            receiver,
            worker,
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drains every event that has arrived since the last call.
    ///
    /// The last event is always `Loaded` or `Failed`, even if the worker died without sending one.
    pub fn poll(&mut self) -> Vec<AssetEvent> {
        let mut events = Vec::new();

        while !self.finished {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let terminal =
                        matches!(event, AssetEvent::Loaded(_) | AssetEvent::Failed(_));
                    events.push(event);
                    if terminal {
                        self.finish();
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    events.push(AssetEvent::Failed(AssetError::Interrupted));
                    self.finish();
                }
            }
        }

        events
    }

    fn finish(&mut self) {
        self.finished = true;

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Asset loader thread panicked");
            }
        }
    }

    /// Whether a terminal event can still arrive.
    pub fn is_pending(&self) -> bool {
        !self.finished
    }
}

fn load(path: &Path, progress: &Sender<AssetEvent>) -> Result<LoadedAsset, AssetError> {
    let io_error = |source: std::io::Error| AssetError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_error)?;
    let total = file.metadata().map_err(io_error)?.len();

    let mut bytes = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = file.read(&mut chunk).map_err(io_error)?;
        if read == 0 {
            break;
        }

        bytes.extend_from_slice(&chunk[..read]);
        let _ = progress.send(AssetEvent::Progress {
            loaded: bytes.len() as u64,
            total,
        });
    }

    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(&bytes)?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob)?;

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Model".to_string());

    Ok(LoadedAsset {
        name,
        document,
        buffers,
    })
}

/// A single-triangle glTF with an embedded buffer.
#[cfg(test)]
pub(crate) const TRIANGLE_GLTF: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "nodes": [0] }],
    "nodes": [{ "name": "Triangle", "mesh": 0 }],
    "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
    "buffers": [{
        "byteLength": 36,
        "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
    }],
    "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
    "accessors": [{
        "bufferView": 0,
        "componentType": 5126,
        "count": 3,
        "type": "VEC3",
        "min": [0.0, 0.0, 0.0],
        "max": [1.0, 1.0, 0.0]
    }]
}"#;

/// Two nodes over the triangle's buffer. The second mesh draws points, which can't be imported.
#[cfg(test)]
pub(crate) const POINTS_SECOND_NODE_GLTF: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "nodes": [0, 1] }],
    "nodes": [
        { "name": "Triangle", "mesh": 0 },
        { "name": "Points", "mesh": 1 }
    ],
    "meshes": [
        { "primitives": [{ "attributes": { "POSITION": 0 } }] },
        { "primitives": [{ "attributes": { "POSITION": 0 }, "mode": 0 }] }
    ],
    "buffers": [{
        "byteLength": 36,
        "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
    }],
    "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
    "accessors": [{
        "bufferView": 0,
        "componentType": 5126,
        "count": 3,
        "type": "VEC3",
        "min": [0.0, 0.0, 0.0],
        "max": [1.0, 1.0, 0.0]
    }]
}"#;
