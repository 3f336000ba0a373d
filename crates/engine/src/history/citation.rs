use vectorlink_common::types::{Annotation, SearchResult};

/// Vault path of the document a file citation points at.
///
/// Uploaded blobs only carry the last path segment as their filename, so
/// the full path comes from the `name` attribute of the search result that
/// produced the citation.
pub fn resolve_citation(annotation: &Annotation, search_results: &[SearchResult]) -> Option<String> {
    let file_id = match annotation {
        Annotation::FileCitation { file_id, .. } | Annotation::ContainerFileCitation { file_id, .. } => {
            file_id
        }
        Annotation::UrlCitation { .. } | Annotation::FilePath { .. } => return None,
    };

    search_results
        .iter()
        .find(|result| &result.file_id == file_id)
        .and_then(|result| result.attributes.get("name"))
        .and_then(|name| name.as_str())
        .map(str::to_string)
}
