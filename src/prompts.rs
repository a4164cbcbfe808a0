//! Prompt text passed to the model runner.
//!
//! Callers normally supply their own prompt to
//! [`crate::controller::RunController::start_run`]; the constant here is the
//! default used by the CLI when no `--prompt` is given.

/// Default instruction: review English scientific texts and write
/// bibliographic fichas in Portuguese.
pub const DEFAULT_PROMPT: &str = "VOCE É UM REVISOR DE BIBLIOGRAFIA QUE PROCESSA TEXTOS CIENTÍFICOS EN INGLÉS E CRIE FICHAS BIBLIOGRÁFICAS EM PORTUGES. Tarefa: Leia o texto seguinte e crie um documento de resumo após ler cada um com as seguintes informações em português: Título; Autores; DOI (se houver); Citação conforme ABNT; Objetivo do artigo; Principais resultados e conclusões; Referência utilizada mais importante (se houver); LEMBRE-SE: EM PORTUGUÊS.";

/// Build the prompt argument, appending image paths for multimodal runs.
///
/// `ollama run` loads any image file path found in the prompt text, so the
/// paths are appended space-separated after the instruction. Spaces inside a
/// path are backslash-escaped, the form `ollama` unescapes when it picks the
/// path out of the prompt.
pub fn prompt_with_images(prompt: &str, images: &[String]) -> String {
    if images.is_empty() {
        return prompt.to_string();
    }
    let mut out = String::with_capacity(prompt.len() + images.iter().map(|i| i.len() + 1).sum::<usize>());
    out.push_str(prompt);
    for image in images {
        out.push(' ');
        out.push_str(&image.replace(' ', "\\ "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_lists_ficha_fields() {
        for field in ["Título", "Autores", "DOI", "ABNT"] {
            assert!(DEFAULT_PROMPT.contains(field), "missing {field}");
        }
    }

    #[test]
    fn images_are_appended_in_order() {
        let p = prompt_with_images("Resuma.", &["/a/fig1.png".into(), "/a/fig2.jpg".into()]);
        assert_eq!(p, "Resuma. /a/fig1.png /a/fig2.jpg");
    }

    #[test]
    fn spaces_in_image_paths_are_escaped() {
        let p = prompt_with_images("Resuma.", &["/my docs/fig 1.png".into()]);
        assert_eq!(p, r"Resuma. /my\ docs/fig\ 1.png");
    }

    #[test]
    fn no_images_leaves_prompt_untouched() {
        assert_eq!(prompt_with_images("Resuma.", &[]), "Resuma.");
    }
}
