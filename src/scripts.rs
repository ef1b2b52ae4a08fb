//! Server-side atomic scripts.
//!
//! All four transitions that touch more than one collection run as Lua
//! scripts so that no other command can interleave between their reads and
//! writes. Concurrent callers observe disjoint task sets purely because the
//! store serializes script execution; the host holds no locks.

/// Move up to `limit` due tasks from the pending ZSET into the running hash.
///
/// KEYS[1] pending ZSET, KEYS[2] running HASH.
/// ARGV[1] max score (now), ARGV[2] limit, ARGV[3] lease start (now).
///
/// Members that fail to decode are removed and skipped so a corrupted entry
/// at the head of the queue can never block delivery of the tasks behind it.
/// Returns the raw JSON members that were leased, in ascending score order.
pub const FETCH_AND_HOLD: &str = r#"
local pending_key = KEYS[1]
local running_key = KEYS[2]
local max_score = ARGV[1]
local limit = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local raw_tasks = redis.call('ZRANGEBYSCORE', pending_key, 0, max_score, 'LIMIT', 0, limit)
local delivered = {}

for i, raw_json in ipairs(raw_tasks) do
    local ok, task = pcall(cjson.decode, raw_json)
    if ok and type(task) == 'table' and task.id ~= nil then
        redis.call('ZREM', pending_key, raw_json)
        local running_data = cjson.encode({start = now, task = task})
        redis.call('HSET', running_key, task.id, running_data)
        delivered[#delivered + 1] = raw_json
    else
        -- poison pill: drop the member so it cannot wedge the queue head
        redis.call('ZREM', pending_key, raw_json)
    end
end

return delivered
"#;

/// Release the lease for a task id. A missing lease is not an error: the
/// watchdog may have reclaimed it first, and the late ack must be a no-op.
///
/// KEYS[1] running HASH. ARGV[1] task id.
pub const ACK: &str = r#"
return redis.call('HDEL', KEYS[1], ARGV[1])
"#;

/// Record a failure: drop the lease, then either reinsert the (already
/// re-serialized, retry-incremented) snapshot into pending or push it to the
/// dead-letter list. Burial and the retry score are decided by the caller;
/// the script only moves state.
///
/// KEYS[1] running HASH, KEYS[2] pending ZSET, KEYS[3] dead LIST.
/// ARGV[1] task id, ARGV[2] snapshot JSON, ARGV[3] retry score,
/// ARGV[4] 1 = bury, 0 = reschedule.
pub const NACK: &str = r#"
local running_key = KEYS[1]
local pending_key = KEYS[2]
local dlq_key = KEYS[3]

local id = ARGV[1]
local task_json = ARGV[2]
local score = ARGV[3]
local is_dead = tonumber(ARGV[4])

redis.call('HDEL', running_key, id)

if is_dead == 1 then
    redis.call('LPUSH', dlq_key, task_json)
else
    redis.call('ZADD', pending_key, score, task_json)
end

return 1
"#;

/// Sweep the running hash for leases older than the visibility timeout and
/// move each one back to pending (retry budget remaining) or to the dead
/// list (budget exhausted). Lease values that fail to decode are dropped
/// rather than re-examined on every future sweep.
///
/// KEYS[1] running HASH, KEYS[2] pending ZSET, KEYS[3] dead LIST.
/// ARGV[1] now, ARGV[2] visibility timeout seconds,
/// ARGV[3] fallback max retries for snapshots that lack one.
/// Returns the number of leases moved.
pub const RECLAIM: &str = r#"
local running_key = KEYS[1]
local pending_key = KEYS[2]
local dlq_key = KEYS[3]

local now = tonumber(ARGV[1])
local timeout = tonumber(ARGV[2])
local fallback_max_retries = tonumber(ARGV[3])

local moved = 0
local entries = redis.call('HGETALL', running_key)

for i = 1, #entries, 2 do
    local id = entries[i]
    local raw = entries[i + 1]
    local ok, lease = pcall(cjson.decode, raw)
    if not ok or type(lease) ~= 'table' or type(lease.task) ~= 'table'
        or tonumber(lease.start) == nil then
        redis.call('HDEL', running_key, id)
    elseif now - tonumber(lease.start) >= timeout then
        redis.call('HDEL', running_key, id)
        local task = lease.task
        task.retry_count = (tonumber(task.retry_count) or 0) + 1
        local max_retries = tonumber(task.max_retries)
        if max_retries == nil or max_retries == 0 then
            max_retries = fallback_max_retries
        end
        local task_json = cjson.encode(task)
        if task.retry_count >= max_retries then
            redis.call('LPUSH', dlq_key, task_json)
        else
            redis.call('ZADD', pending_key, now, task_json)
        end
        moved = moved + 1
    end
end

return moved
"#;
