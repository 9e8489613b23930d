use std::fmt;

use serde::Serialize;

/// Container format of an uploaded resume, decided purely by path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Pdf,
    Docx,
}

impl FileFormat {
    /// Case-insensitive `.pdf` / `.docx` suffix match. No content sniffing.
    pub fn from_path(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(FileFormat::Pdf)
        } else if lower.ends_with(".docx") {
            Some(FileFormat::Docx)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger filter: only resume files enter the pipeline.
pub fn is_resume_path(path: &str) -> bool {
    FileFormat::from_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_suffixes_any_case() {
        assert_eq!(FileFormat::from_path("resumes/dev/cv.pdf"), Some(FileFormat::Pdf));
        assert_eq!(FileFormat::from_path("resumes/dev/CV.PDF"), Some(FileFormat::Pdf));
        assert_eq!(FileFormat::from_path("a/b/Resume.DocX"), Some(FileFormat::Docx));
    }

    #[test]
    fn test_other_paths_are_not_resumes() {
        for path in [
            "",
            "resumes/dev/cv.doc",
            "resumes/dev/cv.pdf.png",
            "resumes/dev/pdf",
            "resumes/dev/cv.docx.tmp",
            "notes.txt",
        ] {
            assert!(!is_resume_path(path), "{path} should be skipped");
        }
    }
}
