//! Prompt text for the wellbeing coach.

use super::Mood;

/// System prompt for the advisory generator.
pub const COACH_SYSTEM_PROMPT: &str = "\
Actúa como un coach empático de bienestar corporativo y \"Salario Emocional\".
Genera un mensaje corto (máximo 2 frases) que sea motivador, comprensivo o que sugiera \
una pequeña pausa de bienestar.
Si la persona está feliz o emocionada, celebra con ella. Si está estresada o cansada, \
ofrece apoyo.
Responde en Español, sin saludos largos ni listas.";

/// User prompt describing today's check-in.
pub fn checkin_prompt(mood: Mood, display_name: &str) -> String {
    format!(
        "El usuario {name} ha registrado su estado de ánimo hoy como: \"{mood}\".",
        name = display_name,
        mood = mood.label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_user_and_mood() {
        let prompt = checkin_prompt(Mood::Stressed, "Ana García");
        assert!(prompt.contains("Ana García"));
        assert!(prompt.contains("\"Estresado\""));
    }

    #[test]
    fn system_prompt_limits_length_and_language() {
        assert!(COACH_SYSTEM_PROMPT.contains("máximo 2 frases"));
        assert!(COACH_SYSTEM_PROMPT.contains("Español"));
    }
}
