//! Instruction text for the two oracle calls.

pub const SCORING_SYSTEM_PROMPT: &str = "\
You are a senior AI engineer and technical editor. From the feed entries you are given, pick the \
ones an in-house enterprise AI team should read, with a focus on ERP modernisation and enterprise \
AI adoption.

Score every entry from 0 to 10:
- 9-10: ERP rebuilds or enterprise finance software with concrete technical detail or measured results.
- 7-9: model or platform updates with a clear enterprise use.
- 5-7: reusable agent, tool, RAG or system-design practice.
- 3-5: product case studies or evaluations backed by real data.
- 0-2: vague commentary or marketing copy.

Return JSON only: an object with a \"scores\" array sorted by score descending. Each element has \
\"link\" (the entry link, unchanged), \"score\" (number) and \"reason\" (one sentence naming the \
value of the entry and the band it matched). Base every reason on the entry itself.";

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You edit an internal strategy brief on frontier AI for engineering and product teams who are \
rebuilding an ERP system on a Java and MySQL stack. For every entry give a one-line conclusion and \
cover: source type (official blog, paper, community, press release), ERP relevance (🔴 High, \
🟡 Medium, 🔵 Low, ⚪ None), implementation method (named stack, architecture or practice) and an \
exploration direction for the ERP rebuild, marked [needs cross-check] when the source lacks the \
detail to support it. Stay concise and never invent facts. Answer with JSON only.";

/// Render the scoring request for a compact candidate projection.
pub fn scoring_user_prompt(count: usize, compact_json: &str) -> String {
    format!(
        "Score the following {count} feed entries:\n\n{compact_json}\n\n\
         Response format:\n\
         {{\n  \"scores\": [\n    {{\"link\": \"...\", \"score\": 8.5, \"reason\": \"...\"}}\n  ]\n}}"
    )
}

/// Render the synthesis request, embedding today's date into the JSON contract.
pub fn synthesis_user_prompt(date: &str, entries_json: &str) -> String {
    format!(
        "Using the top entries below, produce the final daily digest card as JSON that matches the \
         contract exactly.\n\n\
         [Top entries]\n{entries_json}\n\n\
         [JSON contract]\n\
         {{\n\
           \"date\": \"{date}\",\n\
           \"theme\": \"theme of the day, at most 15 characters\",\n\
           \"items\": [\n\
             {{\n\
               \"title\": \"entry title\",\n\
               \"publish_date\": \"YYYY-MM-DD\",\n\
               \"source_type\": \"tech blog / paper / ...\",\n\
               \"source_name\": \"OpenAI / Google / ...\",\n\
               \"erp_relevance\": \"🔴 High / 🟡 Medium / 🔵 Low\",\n\
               \"summary\": \"core summary naming the direction it belongs to\",\n\
               \"key_facts\": \"key facts, data or conclusions\",\n\
               \"implementation_method\": \"implementation method with the named stack\",\n\
               \"exploration_direction\": \"concrete suggestion for our ERP rebuild\",\n\
               \"link\": \"original link\"\n\
             }}\n\
           ]\n\
         }}\n\n\
         [Hard constraints]\n\
         - items must contain every input entry.\n\
         - implementation_method must name a concrete tool, library or framework, or say \
         \"general LLM capability\".\n\
         - exploration_direction must be specific."
    )
}
