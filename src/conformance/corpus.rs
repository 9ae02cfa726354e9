//! Fixture corpus: the manifest plus access to fixture sources.
//!
//! A corpus lives either in a directory (manifest next to the sources) or in
//! a ZIP bundle holding `fixtures.json` and the sources under the same root.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use super::fixture::FixtureManifest;
use crate::error::{Error, Result};

pub const MANIFEST_NAME: &str = "fixtures.json";

#[derive(Debug, Clone)]
enum Sources {
    Directory(PathBuf),
    /// Bundle members keyed by path relative to the manifest
    Bundle(BTreeMap<String, Vec<u8>>),
}

#[derive(Debug, Clone)]
pub struct Corpus {
    manifest: FixtureManifest,
    sources: Sources,
    origin: String,
}

impl Corpus {
    /// Load a manifest file; fixture paths resolve against its directory.
    pub fn from_manifest(path: &Path) -> Result<Self> {
        let manifest = FixtureManifest::load(path)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self {
            manifest,
            sources: Sources::Directory(root),
            origin: path.display().to_string(),
        })
    }

    pub fn from_directory(dir: &Path) -> Result<Self> {
        Self::from_manifest(&dir.join(MANIFEST_NAME))
    }

    pub fn from_bundle(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_bundle_bytes(&data, &path.display().to_string())
    }

    pub fn from_bundle_bytes(data: &[u8], origin: &str) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;

        let names: Vec<String> = archive.file_names().map(String::from).collect();
        // Shallowest fixtures.json wins; its directory is the corpus root.
        let manifest_name = names
            .iter()
            .filter(|n| n.as_str() == MANIFEST_NAME || n.ends_with(&format!("/{MANIFEST_NAME}")))
            .min_by_key(|n| (n.matches('/').count(), n.as_str()))
            .cloned()
            .ok_or_else(|| Error::schema(origin, MANIFEST_NAME, "bundle has no fixture manifest"))?;
        let prefix = manifest_name.trim_end_matches(MANIFEST_NAME).to_string();

        let mut members = BTreeMap::new();
        for name in names.iter().filter(|n| !n.ends_with('/')) {
            let Some(relative) = name.strip_prefix(&prefix) else {
                continue;
            };
            let mut file = archive.by_name(name)?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).map_err(|e| Error::io(name, e))?;
            members.insert(relative.to_string(), buf);
        }

        let manifest_bytes = members
            .get(MANIFEST_NAME)
            .ok_or_else(|| Error::schema(origin, MANIFEST_NAME, "bundle has no fixture manifest"))?;
        let manifest_text = String::from_utf8_lossy(manifest_bytes);
        let manifest_origin = format!("{origin}:{manifest_name}");
        let manifest = FixtureManifest::from_json(&manifest_text, &manifest_origin)?;

        debug!(bundle = origin, members = members.len(), "loaded fixture bundle");
        Ok(Self {
            manifest,
            sources: Sources::Bundle(members),
            origin: origin.to_string(),
        })
    }

    /// In-memory corpus, mostly for tests and embedding.
    pub fn in_memory(manifest: FixtureManifest, sources: BTreeMap<String, String>) -> Self {
        Self {
            manifest,
            sources: Sources::Bundle(sources.into_iter().map(|(k, v)| (k, v.into_bytes())).collect()),
            origin: "<memory>".to_string(),
        }
    }

    pub fn manifest(&self) -> &FixtureManifest {
        &self.manifest
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Source text of a fixture path from the manifest.
    pub fn read_source(&self, relative: &str) -> Result<String> {
        let relative = relative.trim_start_matches("./");
        match &self.sources {
            Sources::Directory(root) => {
                let path = root.join(relative);
                std::fs::read_to_string(&path).map_err(|e| Error::io(path, e))
            }
            Sources::Bundle(members) => {
                let bytes = members.get(relative).ok_or_else(|| {
                    Error::io(
                        relative,
                        std::io::Error::new(std::io::ErrorKind::NotFound, "not in bundle"),
                    )
                })?;
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn bundle(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for (name, body) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    const MANIFEST: &str = r#"{"fixtures": [{"id": "one", "path": "basic/one.svg", "expected": "pass"}]}"#;

    #[test]
    fn bundle_resolves_sources_relative_to_manifest() {
        let data = bundle(&[
            ("corpus/fixtures.json", MANIFEST),
            ("corpus/basic/one.svg", "<svg/>"),
            ("README.txt", "ignored"),
        ]);
        let corpus = Corpus::from_bundle_bytes(&data, "corpus.zip").unwrap();
        assert_eq!(corpus.manifest().fixtures.len(), 1);
        assert_eq!(corpus.read_source("basic/one.svg").unwrap(), "<svg/>");
        assert!(matches!(corpus.read_source("basic/two.svg"), Err(Error::Io { .. })));
    }

    #[test]
    fn bundle_without_manifest_is_rejected() {
        let data = bundle(&[("one.svg", "<svg/>")]);
        assert!(matches!(
            Corpus::from_bundle_bytes(&data, "x.zip"),
            Err(Error::FixtureSchema { .. })
        ));
        assert!(matches!(
            Corpus::from_bundle_bytes(b"not a zip", "x.zip"),
            Err(Error::Archive(_))
        ));
    }

    #[test]
    fn in_memory_corpus_reads_sources() {
        let manifest = FixtureManifest::from_json(MANIFEST, "inline").unwrap();
        let sources = BTreeMap::from([("basic/one.svg".to_string(), "<svg/>".to_string())]);
        let corpus = Corpus::in_memory(manifest, sources);
        assert_eq!(corpus.read_source("./basic/one.svg").unwrap(), "<svg/>");
    }
}
