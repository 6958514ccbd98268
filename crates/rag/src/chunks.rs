//! Turn flattened task documents into retrieval chunks.

use std::collections::BTreeMap;

use connectors::TaskDocument;

/// One chunk per task, preceded by a per-project header chunk listing the
/// tasks it contains. The header gives the retriever something to match
/// when a question asks about a project rather than a single task.
pub fn from_documents(documents: &[TaskDocument]) -> Vec<String> {
    let mut by_project: BTreeMap<String, Vec<&TaskDocument>> = BTreeMap::new();
    for doc in documents {
        let key = doc
            .project
            .clone()
            .unwrap_or_else(|| format!("{} (no project)", doc.platform));
        by_project.entry(key).or_default().push(doc);
    }

    let mut chunks = Vec::with_capacity(documents.len() + by_project.len());
    for (project, docs) in &by_project {
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        chunks.push(format!(
            "Project: {project} ({} tasks): {}",
            docs.len(),
            titles.join("; ")
        ));
        for doc in docs {
            chunks.push(doc.text());
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::Platform;

    fn doc(project: Option<&str>, title: &str) -> TaskDocument {
        TaskDocument {
            platform: Platform::Asana,
            project: project.map(String::from),
            section: None,
            title: title.into(),
            body: None,
            status: None,
            assignee: None,
            url: None,
        }
    }

    #[test]
    fn test_header_chunk_per_project() {
        let docs = vec![
            doc(Some("Website"), "Fix login"),
            doc(Some("Website"), "Update footer"),
            doc(Some("Mobile"), "Crash on launch"),
        ];

        let chunks = from_documents(&docs);
        assert_eq!(chunks.len(), 5);
        assert!(chunks
            .iter()
            .any(|c| c.starts_with("Project: Website (2 tasks)")));
        assert!(chunks.iter().any(|c| c.contains("Crash on launch")));
    }

    #[test]
    fn test_projectless_documents_grouped_by_platform() {
        let chunks = from_documents(&[doc(None, "Orphan")]);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains("asana (no project)"));
    }

    #[test]
    fn test_empty_input() {
        assert!(from_documents(&[]).is_empty());
    }
}
