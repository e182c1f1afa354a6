use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use shared::Language;
use url::Url;

use super::{SpeechError, SpeechSynthesizer};

/// Longest text the engine accepts in one request.
pub const MAX_CHUNK_CHARS: usize = 100;

const SENTENCE_ENDS: &[char] = &['.', '!', '?', '。', '！', '？', '।', '॥'];

/// Google Translate's speech endpoint.
#[derive(Clone)]
pub struct GoogleTtsService {
    client: Client,
    endpoint: Url,
}

impl GoogleTtsService {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        locale: &str,
        index: usize,
        total: usize,
    ) -> Result<Vec<u8>, SpeechError> {
        let total = total.to_string();
        let index = index.to_string();
        let text_len = chunk.chars().count().to_string();

        let response = self
            .client
            .get(self.endpoint.clone())
            .header(USER_AGENT, "Mozilla/5.0")
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", locale),
                ("q", chunk),
                ("total", total.as_str()),
                ("idx", index.as_str()),
                ("textlen", text_len.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Status(status));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        Ok(body.to_vec())
    }
}

impl SpeechSynthesizer for GoogleTtsService {
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        language: Language,
    ) -> BoxFuture<'a, Result<Vec<u8>, SpeechError>> {
        async move {
            let chunks = split_for_speech(text, MAX_CHUNK_CHARS);
            if chunks.is_empty() {
                return Err(SpeechError::EmptyText);
            }

            let locale = engine_locale(language);
            let mut audio = Vec::new();
            for (index, chunk) in chunks.iter().enumerate() {
                let segment = self.fetch_chunk(chunk, locale, index, chunks.len()).await?;
                audio.extend_from_slice(&segment);
            }
            log::debug!(
                "Synthesized {} bytes of audio in {} request(s) for {}",
                audio.len(),
                chunks.len(),
                locale
            );
            Ok(audio)
        }
        .boxed()
    }
}

pub fn engine_locale(language: Language) -> &'static str {
    match language {
        Language::Chinese => "zh-CN",
        Language::English => "en",
        Language::Spanish => "es",
        Language::French => "fr",
        Language::Sanskrit => "sa",
        Language::Punjabi => "pa",
        Language::Hindi => "hi",
        Language::Japanese => "ja",
        Language::Tamil => "ta",
        Language::Arabic => "ar",
        Language::Kannada => "kn",
    }
}

/// Splits text into pieces of at most `max_chars` characters.
///
/// Every sentence starts a new piece; inside a sentence words are packed
/// greedily and a single word longer than the limit is cut.
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();

    for sentence in sentences(text) {
        let mut current = String::new();
        let mut current_len = 0;

        for word in sentence.split_whitespace() {
            let word_len = word.chars().count();

            if word_len > max_chars {
                flush(&mut chunks, &mut current, &mut current_len);
                let chars: Vec<char> = word.chars().collect();
                chunks.extend(chars.chunks(max_chars).map(|piece| piece.iter().collect::<String>()));
                continue;
            }

            if current_len > 0 && current_len + 1 + word_len > max_chars {
                flush(&mut chunks, &mut current, &mut current_len);
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }

        flush(&mut chunks, &mut current, &mut current_len);
    }

    chunks
}

/// Yields sentences with their terminator attached. ASCII terminators only
/// end a sentence before whitespace or end of text, so "3.5" stays whole.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let current = rest;
        let mut chars = current.char_indices().peekable();
        while let Some((index, c)) = chars.next() {
            if !SENTENCE_ENDS.contains(&c) {
                continue;
            }
            let at_boundary = chars.peek().is_none_or(|&(_, next)| next.is_whitespace());
            if !c.is_ascii() || at_boundary {
                let (sentence, tail) = current.split_at(index + c.len_utf8());
                rest = tail;
                return Some(sentence);
            }
        }
        rest = "";
        Some(current)
    })
}

fn flush(chunks: &mut Vec<String>, current: &mut String, current_len: &mut usize) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
    *current_len = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, HttpServer, web};
    use std::collections::HashMap;

    #[test]
    fn short_text_is_split_per_sentence() {
        let chunks = split_for_speech("Stop. Come to a complete stop.", MAX_CHUNK_CHARS);
        assert_eq!(chunks, vec!["Stop.", "Come to a complete stop."]);
    }

    #[test]
    fn decimal_points_do_not_end_a_sentence() {
        let chunks = split_for_speech(
            "No passing for vehicles over 3.5 tons. Vehicles over 3.5 tons are not allowed to pass other vehicles.",
            MAX_CHUNK_CHARS,
        );
        assert_eq!(
            chunks,
            vec![
                "No passing for vehicles over 3.5 tons.",
                "Vehicles over 3.5 tons are not allowed to pass other vehicles.",
            ]
        );

        let chunks = split_for_speech("3.5 टन से अधिक के वाहन। हल्के वाहन?", MAX_CHUNK_CHARS);
        assert_eq!(chunks, vec!["3.5 टन से अधिक के वाहन।", "हल्के वाहन?"]);
    }

    #[test]
    fn long_sentences_are_packed_under_the_limit() {
        let sentence = "word ".repeat(60);
        let chunks = split_for_speech(&sentence, 20);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.join(" "), sentence.trim());
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let text = "速度を時速20キロに減速してください";
        let chunks = split_for_speech(text, 5);

        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn devanagari_danda_ends_a_sentence() {
        let chunks = split_for_speech("रुकें। आगे बढ़ें।", MAX_CHUNK_CHARS);
        assert_eq!(chunks, vec!["रुकें।", "आगे बढ़ें।"]);
    }

    #[test]
    fn blank_text_gives_no_chunks() {
        assert!(split_for_speech("   ", MAX_CHUNK_CHARS).is_empty());
    }

    #[test]
    fn chinese_uses_region_locale() {
        assert_eq!(engine_locale(Language::Chinese), "zh-CN");
        assert_eq!(engine_locale(Language::Kannada), "kn");
    }

    async fn fake_engine(query: web::Query<HashMap<String, String>>) -> HttpResponse {
        let text = query.get("q").cloned().unwrap_or_default();
        if text.contains("fail") {
            return HttpResponse::ServiceUnavailable().finish();
        }
        if text.contains("silent") {
            return HttpResponse::Ok().content_type("audio/mpeg").finish();
        }
        let body = format!(
            "[{}:{}/{}:{}:{}]",
            query.get("tl").cloned().unwrap_or_default(),
            query.get("idx").cloned().unwrap_or_default(),
            query.get("total").cloned().unwrap_or_default(),
            query.get("client").cloned().unwrap_or_default(),
            text
        );
        HttpResponse::Ok().content_type("audio/mpeg").body(body)
    }

    async fn start_fake_engine() -> (Url, actix_web::dev::ServerHandle) {
        let server = HttpServer::new(|| App::new().route("/tts", web::get().to(fake_engine)))
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        let endpoint = Url::parse(&format!("http://{}/tts", addr)).unwrap();
        (endpoint, handle)
    }

    #[actix_web::test]
    async fn segments_are_fetched_in_order_and_concatenated() {
        let (endpoint, handle) = start_fake_engine().await;
        let service = GoogleTtsService::new(endpoint);

        let audio = service
            .synthesize("Stop. Check all directions.", Language::Chinese)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(audio).unwrap(),
            "[zh-CN:0/2:tw-ob:Stop.][zh-CN:1/2:tw-ob:Check all directions.]"
        );
        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn engine_errors_surface_as_speech_errors() {
        let (endpoint, handle) = start_fake_engine().await;
        let service = GoogleTtsService::new(endpoint);

        let failed = service.synthesize("Please fail.", Language::English).await;
        assert!(matches!(failed, Err(SpeechError::Status(status)) if status.as_u16() == 503));

        let silent = service.synthesize("Be silent.", Language::English).await;
        assert!(matches!(silent, Err(SpeechError::EmptyAudio)));

        let empty = service.synthesize("  ", Language::English).await;
        assert!(matches!(empty, Err(SpeechError::EmptyText)));

        handle.stop(true).await;
    }
}
