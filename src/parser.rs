//! Dictionary lookup and input tokenisation

use crate::error::Fault;
use crate::memory::{Address, Memory};
use crate::text::Text;

/// Translator of typed commands into parse-table tokens.
#[derive(Debug, Clone, Copy)]
pub struct Parser {
    version: u8,
}

struct Dictionary {
    separators: Address,
    num_separators: u8,
    entry_length: u8,
    num_entries: u16,
    first_entry: Address,
}

impl Dictionary {
    fn read(memory: &Memory, dict: Address) -> Result<Self, Fault> {
        let num_separators = memory.read8(dict)?;
        let entries = dict + 1 + Address::from(num_separators);
        Ok(Self {
            separators: dict + 1,
            num_separators,
            entry_length: memory.read8(entries)?,
            num_entries: memory.read16(entries + 1)?,
            first_entry: entries + 3,
        })
    }

    fn is_separator(&self, memory: &Memory, ch: u8) -> Result<bool, Fault> {
        if ch == b' ' || ch == 0 {
            return Ok(true);
        }
        for i in 0..self.num_separators {
            if memory.read8(self.separators + Address::from(i))? == ch {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Parser {
    /// Build a parser for the given story version.
    pub const fn new(version: u8) -> Self {
        Self { version }
    }

    /// Longest word, in characters, that takes part in dictionary lookup.
    pub const fn max_word_len(&self) -> usize {
        if self.version <= 3 {
            6
        } else {
            9
        }
    }

    /// Tokenise the zero-terminated input text at `input` against the
    /// dictionary, writing the parse table at `parse`.
    ///
    /// `input_offset` is the position of the first text byte within its
    /// buffer, recorded with each token. With `preserve_unrecognised` the
    /// parse entries of unknown words are left untouched rather than zeroed.
    pub fn tokenise(
        &self,
        memory: &mut Memory,
        text: &Text,
        parse: u16,
        input: u16,
        input_offset: u8,
        dict: u16,
        preserve_unrecognised: bool,
    ) -> Result<(), Fault> {
        let parse = Address::from(parse);
        let input = Address::from(input);
        let dictionary = Dictionary::read(memory, Address::from(dict))?;

        let max_words = memory.read8(parse)?;
        let mut num_words: u8 = 0;

        let mut word: Vec<u8> = Vec::with_capacity(self.max_word_len());
        let mut word_start: u8 = 0;

        for i in 0..=255u16 {
            let ch = memory.read8(input + Address::from(i))?;
            let is_separator = dictionary.is_separator(memory, ch)?;

            if !is_separator {
                if word.is_empty() {
                    word_start = i as u8;
                }
                if word.len() < self.max_word_len() {
                    word.push(ch);
                }
            } else if !word.is_empty() {
                let entry = self.lookup(memory, text, &dictionary, &word)?;
                let slot = parse + 2 + Address::from(num_words) * 4;
                if entry != 0 || !preserve_unrecognised {
                    memory.write16(slot, entry)?;
                    memory.write8(slot + 2, word.len() as u8)?;
                    memory.write8(slot + 3, word_start.wrapping_add(input_offset))?;
                }
                num_words += 1;
                word.clear();
            }

            if ch == 0 || num_words == max_words {
                break;
            }
        }

        memory.write8(parse + 1, num_words)
    }

    fn lookup(&self, memory: &Memory, text: &Text, dictionary: &Dictionary, word: &[u8]) -> Result<u16, Fault> {
        let (key, key_words) = text.encode_word(memory, word)?;
        for i in 0..dictionary.num_entries {
            let entry = dictionary.first_entry + Address::from(i) * Address::from(dictionary.entry_length);
            let mut matched = true;
            for (w, key_word) in key.iter().enumerate().take(key_words) {
                if memory.read16(entry + 2 * w as Address)? != *key_word {
                    matched = false;
                    break;
                }
            }
            if matched {
                return Ok(entry as u16);
            }
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::HEADER_SIZE;
    use crate::header::{offset, Header};

    const DICT: Address = 0x200;
    const PARSE: Address = 0x300;
    const INPUT: Address = 0x340;

    fn fixture(words: &[&str]) -> (Parser, Text, Memory) {
        let mut header_bytes = vec![0u8; HEADER_SIZE];
        header_bytes[offset::VERSION as usize] = 3;
        let header = Header::parse(&header_bytes).unwrap();
        let text = Text::new(&header);

        let mut memory = Memory::new();
        memory.resize(0x1000);

        // Dictionary: '.' and ',' as extra separators, 4-byte entries.
        memory.write8(DICT, 2).unwrap();
        memory.write8(DICT + 1, b'.').unwrap();
        memory.write8(DICT + 2, b',').unwrap();
        memory.write8(DICT + 3, 4).unwrap();
        memory.write16(DICT + 4, words.len() as u16).unwrap();
        for (i, word) in words.iter().enumerate() {
            let (key, _) = text.encode_word(&memory, word.as_bytes()).unwrap();
            let entry = DICT + 6 + 4 * i as Address;
            memory.write16(entry, key[0]).unwrap();
            memory.write16(entry + 2, key[1]).unwrap();
        }

        memory.write8(PARSE, 10).unwrap();
        (Parser::new(3), text, memory)
    }

    fn type_line(memory: &mut Memory, line: &str) {
        for (i, b) in line.bytes().enumerate() {
            memory.write8(INPUT + i as Address, b).unwrap();
        }
        memory.write8(INPUT + line.len() as Address, 0).unwrap();
    }

    #[test]
    fn tokenises_known_words() {
        let (parser, text, mut memory) = fixture(&["pick", "up", "key"]);
        type_line(&mut memory, "pick up key.");
        parser
            .tokenise(&mut memory, &text, PARSE as u16, INPUT as u16, 1, DICT as u16, false)
            .unwrap();

        assert_eq!(memory.read8(PARSE + 1).unwrap(), 3);
        let entry = |i: Address| {
            (
                memory.read16(PARSE + 2 + i * 4).unwrap(),
                memory.read8(PARSE + 2 + i * 4 + 2).unwrap(),
                memory.read8(PARSE + 2 + i * 4 + 3).unwrap(),
            )
        };
        assert_eq!(entry(0), ((DICT + 6) as u16, 4, 1));
        assert_eq!(entry(1), ((DICT + 10) as u16, 2, 6));
        assert_eq!(entry(2), ((DICT + 14) as u16, 3, 9));
    }

    #[test]
    fn unknown_words_store_zero_entries() {
        let (parser, text, mut memory) = fixture(&["pick"]);
        type_line(&mut memory, "pick xyzzy");
        parser
            .tokenise(&mut memory, &text, PARSE as u16, INPUT as u16, 1, DICT as u16, false)
            .unwrap();
        assert_eq!(memory.read8(PARSE + 1).unwrap(), 2);
        assert_eq!(memory.read16(PARSE + 2 + 4).unwrap(), 0);
        assert_eq!(memory.read8(PARSE + 2 + 4 + 2).unwrap(), 5);
    }

    #[test]
    fn preserve_flag_skips_unknown_words() {
        let (parser, text, mut memory) = fixture(&["pick"]);
        memory.write16(PARSE + 2 + 4, 0xDEAD).unwrap();
        type_line(&mut memory, "pick xyzzy");
        parser
            .tokenise(&mut memory, &text, PARSE as u16, INPUT as u16, 1, DICT as u16, true)
            .unwrap();
        assert_eq!(memory.read8(PARSE + 1).unwrap(), 2);
        assert_eq!(memory.read16(PARSE + 2 + 4).unwrap(), 0xDEAD);
    }

    #[test]
    fn long_words_truncate_to_the_version_limit() {
        let (parser, text, mut memory) = fixture(&["abcdef"]);
        type_line(&mut memory, "abcdefgh");
        parser
            .tokenise(&mut memory, &text, PARSE as u16, INPUT as u16, 1, DICT as u16, false)
            .unwrap();
        assert_eq!(memory.read8(PARSE + 1).unwrap(), 1);
        // Truncated to six characters, it still matches its dictionary key.
        assert_eq!(memory.read16(PARSE + 2).unwrap(), (DICT + 6) as u16);
        assert_eq!(memory.read8(PARSE + 2 + 2).unwrap(), 6);
    }
}
