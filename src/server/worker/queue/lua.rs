//! Lua scripts for the WorkerQueue redis implementation

// Lua script to atomically take the next task in priority order
// Walks the queues in the order provided and moves the oldest task of the first non-empty
// queue into the processing list, so a task is never lost between pop and ack.
//
// KEYS[1..n-1]: queue list keys in priority order
// KEYS[n]: processing list key
//
// Returns:
//   {queue key, raw task} if a task was taken
//   {} if every queue is empty
pub static POP_TASK_SCRIPT: &str = r#"
local processing = KEYS[#KEYS]

for i = 1, #KEYS - 1 do
    local raw = redis.call('RPOPLPUSH', KEYS[i], processing)
    if raw then
        return {KEYS[i], raw}
    end
end

return {}
"#;

// Lua script to move a task from the processing list to the dead-letter list
//
// KEYS[1]: processing list key
// KEYS[2]: dead-letter list key
// ARGV[1]: raw task as taken from the queue
// ARGV[2]: dead-letter record
//
// Returns: number of entries removed from the processing list
pub static DEAD_LETTER_SCRIPT: &str = r#"
local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
redis.call('LPUSH', KEYS[2], ARGV[2])
return removed
"#;

// Lua script to return an unacknowledged task to its queue
// The task is pushed on the consuming end so it is delivered before newer tasks.
//
// KEYS[1]: processing list key
// KEYS[2]: queue list key
// ARGV[1]: raw task
//
// Returns: 1 if the task was requeued, 0 if it was no longer being processed
pub static REQUEUE_TASK_SCRIPT: &str = r#"
local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
if removed > 0 then
    redis.call('RPUSH', KEYS[2], ARGV[1])
    return 1
end
return 0
"#;
