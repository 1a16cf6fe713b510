// Every fallible operation in the crate returns `errors::Result`.
// `error_chain!` creates the Error, ErrorKind, ResultExt, and Result types and the From
// conversions that let ? work for our `Error`; ResultExt adds `chain_err`.
//
// Errors raised on a producer thread are moved to the owning thread inside a `StreamEvent`,
// which only needs them to be `Send`.
#![allow(deprecated)] // error_chain still emits `Error::description` impls

error_chain! {

    foreign_links {
        DocOptFailure(::docopt::Error);
        ConfigParse(::serde_yaml::Error);
        Io(::std::io::Error);
    }

    errors {
        EngineInitTimeout(attempts: u32) {
            description("engine start call never ran on the main thread")
            display("engine start call did not run on the main thread after {} attempts", attempts)
        }
        EngineCallFailure(call: String) {
            description("engine call failed")
            display("engine call failed: {}", call)
        }
        EngineNotInitialized {
            description("engine has not been initialised")
            display("engine has not been initialised with a maze")
        }
        NoDataProduced {
            description("stream produced no snapshots")
            display("the engine produced no usable snapshots before going silent")
        }
        ShutdownTimeout(millis: u64) {
            description("worker did not stop in time")
            display("worker thread did not stop within {} ms and was abandoned", millis)
        }
        MalformedSnapshot(expected: usize, actual: usize) {
            description("snapshot size does not match the grid")
            display("snapshot has {} cells, the grid needs {}", actual, expected)
        }
        ExecutorClosed {
            description("main thread executor has shut down")
            display("main thread executor has shut down, task rejected")
        }
        InvalidDimensions(length: usize, width: usize) {
            description("grid dimensions are unusable")
            display("grid dimensions {}x{} are unusable", length, width)
        }
        NotReadyForSearch {
            description("no completed maze to search")
            display("maze generation has not completed, cannot search yet")
        }
        InvalidEndpoint(x: u32, y: u32) {
            description("search endpoint is not walkable")
            display("search endpoint ({}, {}) is outside the maze or on a wall", x, y)
        }
    }
}
