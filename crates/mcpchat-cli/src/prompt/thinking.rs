use rand::seq::SliceRandom;

const THINKING_MESSAGES: &[&str] = &[
    "Thinking",
    "Working on it",
    "Asking the model",
    "Calling tools",
    "Clicking around",
    "Reading the page",
    "Taking notes",
    "Following links",
    "Checking the results",
    "Putting it together",
];

pub fn get_random_thinking_message() -> &'static str {
    THINKING_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Thinking")
}
