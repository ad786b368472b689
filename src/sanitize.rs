use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Reduce an arbitrary user-supplied filename to a storage-safe token.
///
/// Accented characters are decomposed (NFD) and their combining marks
/// dropped, whitespace runs collapse to a single underscore, and anything
/// outside `[A-Za-z0-9_.-]` is removed. May return an empty string; callers
/// prefix a timestamp and owner namespace, so uniqueness is not this
/// function's job.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_allowed(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
    }

    #[test]
    fn strips_accents_to_base_letters() {
        assert_eq!(sanitize_filename("Día_de_piernas.mp4"), "Dia_de_piernas.mp4");
        assert_eq!(sanitize_filename("áéíóúñü"), "aeiounu");
    }

    #[test]
    fn collapses_whitespace_runs_to_one_underscore() {
        assert_eq!(sanitize_filename("Squat   Day.mp4"), "Squat_Day.mp4");
        assert_eq!(sanitize_filename("a \t\n b"), "a_b");
    }

    #[test]
    fn output_stays_within_allowed_charset() {
        let inputs = [
            "Día 1 — Sentadillas (áéí).mp4",
            "press banca!!.MOV",
            "видео тренировки.mp4",
            "🏋️ leg day.webm",
            "..\\..\\evil name?.mp4",
        ];
        for input in inputs {
            let cleaned = sanitize_filename(input);
            assert!(
                cleaned.chars().all(is_allowed),
                "{:?} produced {:?}",
                input,
                cleaned
            );
            assert!(!cleaned.contains(char::is_whitespace));
        }
    }

    #[test]
    fn keeps_dots_dashes_underscores() {
        assert_eq!(sanitize_filename("my-file_1.v2.mp4"), "my-file_1.v2.mp4");
    }

    #[test]
    fn all_stripped_input_yields_empty_string() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("¿¡«»"), "");
    }
}
