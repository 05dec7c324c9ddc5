//! Built-in trivia so the game is playable without a corpus file.

use crate::domain::{Prompt, PromptId};

fn seed(id: u64, text: &str, reading: &str, source: Option<&str>) -> Prompt {
  Prompt {
    id: PromptId(id),
    text: text.into(),
    reading: reading.into(),
    source: source.map(Into::into),
  }
}

/// Seed ids live far above typical corpus ids so they rarely collide.
pub fn seed_prompts() -> Vec<Prompt> {
  vec![
    seed(
      900_001,
      "タコの心臓は3つある",
      "takonoshinzouhamittuaru",
      Some("https://ja.wikipedia.org/wiki/タコ"),
    ),
    seed(
      900_002,
      "ハチミツは腐らない",
      "hatimituhakusaranai",
      Some("https://ja.wikipedia.org/wiki/蜂蜜"),
    ),
    seed(
      900_003,
      "キリンの睡眠時間は一日二十分ほど",
      "kirinnnosuiminnjikannhaitinitinijuppunnhodo",
      None,
    ),
    seed(
      900_004,
      "パンダの尻尾は白い",
      "pandanosippohasiroi",
      Some("https://ja.wikipedia.org/wiki/ジャイアントパンダ"),
    ),
    seed(
      900_005,
      "金星の一日は一年より長い",
      "kinnseinoitinitihaitinennyorinagai",
      Some("https://ja.wikipedia.org/wiki/金星"),
    ),
    seed(
      900_006,
      "バナナはベリーの仲間",
      "bananahaberi-nonakama",
      None,
    ),
  ]
}
