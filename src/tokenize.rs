/// Tokenizes an input line into a vector of owned words.
/// Runs of whitespace separate tokens; no quoting or escaping is recognised,
/// so `|` and `<` only have meaning as standalone tokens.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in input.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
