use std::path::PathBuf;

use idea_datastore::DataStore;

use crate::{
    pipeline::{AppendSink, PipelineRunner},
    processor::{ChunkingConfig, IDEA_SYSTEM_PROMPT, IDEA_USER_PROMPT},
    yt::{AudioHandler, VideoSearcher},
    IdeaProcessor, Prompt, Synthesizer, Transcriber,
};

pub struct IdeaProcessorBuilder<D = (), T = (), S = (), A = (), P = ()> {
    workdir: PathBuf,
    store: D,
    transcriber: T,
    synthesizer: S,
    audio_handler: A,
    searcher: P,
    search_limit: usize,
    chunking_config: Option<ChunkingConfig>,
    prompt: Prompt,
}

impl IdeaProcessorBuilder {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            store: (),
            transcriber: (),
            synthesizer: (),
            audio_handler: (),
            searcher: (),
            search_limit: 5,
            chunking_config: None,
            prompt: Prompt::new(IDEA_SYSTEM_PROMPT, IDEA_USER_PROMPT),
        }
    }
}

impl<D, T, S, A, P> IdeaProcessorBuilder<D, T, S, A, P> {
    pub fn store<D2: DataStore + Send + Sync + 'static>(
        self,
        store: D2,
    ) -> IdeaProcessorBuilder<D2, T, S, A, P> {
        IdeaProcessorBuilder {
            workdir: self.workdir,
            store,
            transcriber: self.transcriber,
            synthesizer: self.synthesizer,
            audio_handler: self.audio_handler,
            searcher: self.searcher,
            search_limit: self.search_limit,
            chunking_config: self.chunking_config,
            prompt: self.prompt,
        }
    }

    pub fn transcriber<T2: Transcriber + Send + Sync + 'static>(
        self,
        transcriber: T2,
    ) -> IdeaProcessorBuilder<D, T2, S, A, P> {
        IdeaProcessorBuilder {
            workdir: self.workdir,
            store: self.store,
            transcriber,
            synthesizer: self.synthesizer,
            audio_handler: self.audio_handler,
            searcher: self.searcher,
            search_limit: self.search_limit,
            chunking_config: self.chunking_config,
            prompt: self.prompt,
        }
    }

    pub fn synthesizer<S2: Synthesizer + Send + Sync + 'static>(
        self,
        synthesizer: S2,
    ) -> IdeaProcessorBuilder<D, T, S2, A, P> {
        IdeaProcessorBuilder {
            workdir: self.workdir,
            store: self.store,
            transcriber: self.transcriber,
            synthesizer,
            audio_handler: self.audio_handler,
            searcher: self.searcher,
            search_limit: self.search_limit,
            chunking_config: self.chunking_config,
            prompt: self.prompt,
        }
    }

    pub fn audio_handler<A2: AudioHandler + Send + Sync + 'static>(
        self,
        audio_handler: A2,
    ) -> IdeaProcessorBuilder<D, T, S, A2, P> {
        IdeaProcessorBuilder {
            workdir: self.workdir,
            store: self.store,
            transcriber: self.transcriber,
            synthesizer: self.synthesizer,
            audio_handler,
            searcher: self.searcher,
            search_limit: self.search_limit,
            chunking_config: self.chunking_config,
            prompt: self.prompt,
        }
    }

    pub fn searcher<P2: VideoSearcher + Send + Sync + 'static>(
        self,
        searcher: P2,
    ) -> IdeaProcessorBuilder<D, T, S, A, P2> {
        IdeaProcessorBuilder {
            workdir: self.workdir,
            store: self.store,
            transcriber: self.transcriber,
            synthesizer: self.synthesizer,
            audio_handler: self.audio_handler,
            searcher,
            search_limit: self.search_limit,
            chunking_config: self.chunking_config,
            prompt: self.prompt,
        }
    }

    pub fn search_limit(mut self, search_limit: usize) -> Self {
        self.search_limit = search_limit;
        self
    }

    pub fn with_chunking(mut self, chunk_duration_seconds: u16) -> Self {
        self.chunking_config = Some(ChunkingConfig {
            chunk_duration_seconds,
        });
        self
    }

    pub fn prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = prompt;
        self
    }
}

impl<D, T, S, A, P> IdeaProcessorBuilder<D, T, S, A, P>
where
    D: DataStore + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    S: Synthesizer + Send + Sync + 'static,
    A: AudioHandler + Send + Sync + 'static,
    P: VideoSearcher + Send + Sync + 'static,
{
    pub fn build(self) -> IdeaProcessor<D, T, S, A, P> {
        IdeaProcessor {
            runner: PipelineRunner::new(self.workdir.join("scratch")),
            workdir: self.workdir,
            sink: AppendSink::new(self.store),
            transcriber: self.transcriber,
            synthesizer: self.synthesizer,
            audio_handler: self.audio_handler,
            searcher: self.searcher,
            search_limit: self.search_limit,
            chunking_config: self.chunking_config,
            prompt: self.prompt,
        }
    }
}
