use crate::error::VaultError;

pub const MIN_INSTANCE_ID_LEN: usize = 3;
pub const MAX_INSTANCE_ID_LEN: usize = 50;

fn transliterate(c: char) -> Option<&'static str> {
    Some(match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    })
}

/// Lowercase, transliterate Cyrillic, and collapse every run of other
/// characters into a single `-`.
fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;

    let mut push = |piece: &str, out: &mut String| {
        for c in piece.chars() {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c);
            } else {
                pending_dash = true;
            }
        }
    };

    for c in text.chars().flat_map(char::to_lowercase) {
        match transliterate(c) {
            Some(latin) => push(latin, &mut out),
            None => {
                let mut buf = [0u8; 4];
                push(c.encode_utf8(&mut buf), &mut out);
            }
        }
    }
    out
}

/// Derive an instance id from a bundle title and game version.
///
/// `"Техномагия"` and `"1.20.1"` give `"tehnomagiya-1-20-1"`.
pub fn generate_instance_id(title: &str, mc_version: &str) -> String {
    let title = slugify(title);
    let version = slugify(mc_version);
    match (title.is_empty(), version.is_empty()) {
        (false, false) => format!("{title}-{version}"),
        (false, true) => title,
        _ => version,
    }
}

/// Accept ids of 3 to 50 characters from `[a-z0-9-]` that start and end
/// with a letter or digit.
pub fn validate_instance_id(id: &str) -> Result<(), VaultError> {
    let invalid = |reason: &str| VaultError::InvalidInstanceId(format!("'{id}': {reason}"));

    if id.len() < MIN_INSTANCE_ID_LEN || id.len() > MAX_INSTANCE_ID_LEN {
        return Err(invalid("must be 3-50 characters"));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("only lowercase letters, digits and '-' are allowed"));
    }
    if id.starts_with('-') || id.ends_with('-') {
        return Err(invalid("must start and end with a letter or digit"));
    }
    Ok(())
}
