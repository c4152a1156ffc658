#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

#[macro_export]
macro_rules! rule {
    (
        name: $name:expr,
        kind: $kind:expr,
        score: $score:expr,
        applies: $applies:expr
        $(, message: $message:expr)?
        $(, sound: $sound:expr)?
        $(, command: $command:expr)?
        $(, enabled: $enabled:expr)?
        $(,)?
    ) => {{
        #[allow(unused_mut)]
        let mut rule = $crate::Rule::new($name, $kind, $score, $applies);
        $( rule.message = Some($message.into()); )?
        $( rule.sound = Some($sound.into()); )?
        $( rule.command = Some($command.into()); )?
        $( rule.enabled = $enabled; )?
        rule
    }};
}
