use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{anyhow, Context};
use encoding_rs::UTF_8;
use zip::ZipArchive;

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub const EMBEDDINGS_DIR: &str = "word/embeddings/";
pub const OLE_OBJECT_EXT: &str = ".bin";

pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path, max_bytes: u64) -> anyhow::Result<Self> {
        let meta = std::fs::metadata(path).with_context(|| format!("stat docx: {}", path.display()))?;
        if meta.len() > max_bytes {
            return Err(anyhow!(
                "file too large: {} bytes (limit {} bytes)",
                meta.len(),
                max_bytes
            ));
        }
        let bytes = std::fs::read(path).with_context(|| format!("read docx: {}", path.display()))?;
        Self::from_bytes(&bytes, max_bytes)
    }

    pub fn from_bytes(bytes: &[u8], max_bytes: u64) -> anyhow::Result<Self> {
        if bytes.is_empty() {
            return Err(anyhow!("no file uploaded"));
        }
        if bytes.len() as u64 > max_bytes {
            return Err(anyhow!(
                "file too large: {} bytes (limit {} bytes)",
                bytes.len(),
                max_bytes
            ));
        }
        let mut zip = ZipArchive::new(Cursor::new(bytes)).context("read zip")?;
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .with_context(|| format!("read zip entry: {}", file.name()))?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn entry(&self, name: &str) -> Option<&DocxEntry> {
        self.entries.iter().find(|e| !e.is_dir && e.name == name)
    }

    /// Decodes an XML part as UTF-8 (BOM stripped). Missing parts yield an empty string.
    pub fn xml_text(&self, name: &str) -> String {
        match self.entry(name) {
            Some(ent) => {
                let (text, _) = UTF_8.decode_with_bom_removal(&ent.data);
                text.into_owned()
            }
            None => String::new(),
        }
    }

    /// Embedded OLE payloads keyed by their package path (`word/embeddings/*.bin`).
    pub fn embedded_objects(&self) -> BTreeMap<String, &[u8]> {
        self.entries
            .iter()
            .filter(|e| {
                !e.is_dir && e.name.starts_with(EMBEDDINGS_DIR) && e.name.ends_with(OLE_OBJECT_EXT)
            })
            .map(|e| (e.name.clone(), e.data.as_slice()))
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::build_docx;
    use super::*;

    #[test]
    fn collects_only_embedded_bins() {
        let bytes = build_docx(&[
            (DOCUMENT_PART, b"<w:document/>"),
            ("word/embeddings/oleObject1.bin", b"\x01\x02"),
            ("word/embeddings/Microsoft_Excel.xlsx", b"xx"),
            ("word/media/image1.wmf", b"yy"),
        ]);
        let pkg = DocxPackage::from_bytes(&bytes, 1 << 20).expect("read docx");
        let bins = pkg.embedded_objects();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins["word/embeddings/oleObject1.bin"], b"\x01\x02");
    }

    #[test]
    fn xml_text_strips_bom_and_tolerates_absence() {
        let bytes = build_docx(&[(DOCUMENT_RELS_PART, b"\xEF\xBB\xBF<Relationships/>")]);
        let pkg = DocxPackage::from_bytes(&bytes, 1 << 20).expect("read docx");
        assert_eq!(pkg.xml_text(DOCUMENT_RELS_PART), "<Relationships/>");
        assert_eq!(pkg.xml_text(DOCUMENT_PART), "");
    }

    #[test]
    fn rejects_empty_oversized_and_non_zip_input() {
        assert!(DocxPackage::from_bytes(&[], 10).is_err());
        let bytes = build_docx(&[(DOCUMENT_PART, b"<w:document/>")]);
        let err = DocxPackage::from_bytes(&bytes, 4).err().expect("too large");
        assert!(err.to_string().contains("too large"));
        assert!(DocxPackage::from_bytes(b"not a zip archive", 1 << 20).is_err());
    }
}
